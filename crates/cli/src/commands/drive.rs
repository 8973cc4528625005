//! Drive management commands
//!
//! A drive is a named S3-compatible endpoint with credentials and an optional
//! pinned container. Paths address it as `<name>:/container/key`.

use clap::Subcommand;
use serde::Serialize;

use bkd_core::{DriveProfile, ProfileManager};

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Drive subcommands
#[derive(Subcommand, Debug)]
pub enum DriveCommands {
    /// Add or update a drive
    Set(SetArgs),

    /// List configured drives
    List(ListArgs),

    /// Remove a drive
    Remove(RemoveArgs),
}

/// Arguments for the `drive set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Drive name (e.g., "helm", "backups")
    pub name: String,

    /// S3 endpoint URL (e.g., "http://localhost:9000")
    pub endpoint: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// AWS region
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Pin the drive to a single container
    #[arg(long)]
    pub container: Option<String>,

    /// Project or account the drive belongs to
    #[arg(long)]
    pub scope_id: Option<String>,

    /// Reject keys deeper than this many segments
    #[arg(long)]
    pub max_depth: Option<usize>,
}

/// Arguments for the `drive list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region, lookup style and scope
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `drive remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the drive to remove
    pub name: String,
}

/// Drive information for JSON output (without credentials)
#[derive(Serialize)]
struct DriveInfo {
    name: String,
    endpoint: String,
    region: String,
    bucket_lookup: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope_id: Option<String>,
}

impl From<&DriveProfile> for DriveInfo {
    fn from(profile: &DriveProfile) -> Self {
        Self {
            name: profile.name.clone(),
            endpoint: profile.endpoint.clone(),
            region: profile.region.clone(),
            bucket_lookup: profile.bucket_lookup.clone(),
            container: profile.container.clone(),
            scope_id: profile.scope_id.clone(),
        }
    }
}

#[derive(Serialize)]
struct DriveListOutput {
    drives: Vec<DriveInfo>,
}

#[derive(Serialize)]
struct DriveOperationOutput {
    success: bool,
    drive: String,
    message: String,
}

/// Execute a drive subcommand
pub fn execute(cmd: DriveCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ProfileManager::new() {
        Ok(manager) => manager,
        Err(e) => return fail(&formatter, &e),
    };

    match cmd {
        DriveCommands::Set(args) => execute_set(args, &manager, &formatter),
        DriveCommands::List(args) => execute_list(&args, &manager, &formatter),
        DriveCommands::Remove(args) => execute_remove(&args, &manager, &formatter),
    }
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let mut profile = DriveProfile::new(
        &args.name,
        &args.endpoint,
        &args.access_key,
        &args.secret_key,
    );
    profile.region = args.region;
    profile.bucket_lookup = args.bucket_lookup;
    profile.container = args.container;
    profile.scope_id = args.scope_id;
    profile.max_depth = args.max_depth;

    if let Err(e) = manager.set(profile) {
        return fail(formatter, &e);
    }

    let message = format!("Drive '{}' configured successfully", args.name);
    if formatter.is_json() {
        formatter.json(&DriveOperationOutput {
            success: true,
            drive: args.name,
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}

fn execute_list(args: &ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let drives = match manager.list() {
        Ok(drives) => drives,
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&DriveListOutput {
            drives: drives.iter().map(DriveInfo::from).collect(),
        });
        return ExitCode::Success;
    }

    if drives.is_empty() {
        formatter.println("No drives configured.");
        return ExitCode::Success;
    }

    let rows = drives
        .iter()
        .map(|d| {
            let mut row = vec![
                d.root(),
                d.endpoint.clone(),
                d.container.clone().unwrap_or_else(|| "*".to_string()),
            ];
            if args.long {
                row.push(d.region.clone());
                row.push(d.bucket_lookup.clone());
                row.push(d.scope_id.clone().unwrap_or_default());
            }
            row
        })
        .collect();

    if args.long {
        formatter.table(
            &["Drive", "Endpoint", "Container", "Region", "Lookup", "Scope"],
            rows,
        );
    } else {
        formatter.table(&["Drive", "Endpoint", "Container"], rows);
    }
    ExitCode::Success
}

fn execute_remove(args: &RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    if let Err(e) = manager.remove(&args.name) {
        return fail(formatter, &e);
    }

    let message = format!("Drive '{}' removed", args.name);
    if formatter.is_json() {
        formatter.json(&DriveOperationOutput {
            success: true,
            drive: args.name.clone(),
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}
