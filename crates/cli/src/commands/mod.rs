//! CLI command definitions and execution
//!
//! Every command follows the same shape: parse its arguments, mount the drive
//! named by the path prefix (`<drive>:/container/key`), call into the engine
//! and map the outcome to an [`ExitCode`].

use std::sync::Arc;

use clap::{Parser, Subcommand};

use bkd_core::{DriveConnection, Error, Plan, ProfileManager, Result};
use bkd_s3::S3Store;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod completions;
mod cp;
mod drive;
mod ls;
mod mkdir;
mod mv;
mod pipe;
mod put;
mod rm;
mod stat;
mod test_path;
mod touch;

/// bkd - browse and edit object storage as a drive
///
/// Containers are top-level directories; keys split on `/` become nested
/// directories, and every object is a file.
#[derive(Parser, Debug)]
#[command(name = "bkd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage drives
    #[command(subcommand)]
    Drive(drive::DriveCommands),

    /// List the children of a path
    Ls(ls::LsArgs),

    /// Show what a path resolves to
    Stat(stat::StatArgs),

    /// Check whether a path exists
    Test(test_path::TestArgs),

    /// Create a container or directory
    Mkdir(mkdir::MkdirArgs),

    /// Create an item (empty leaf by default)
    Touch(touch::TouchArgs),

    /// Upload a local file to a leaf
    Put(put::PutArgs),

    /// Print the content of a leaf
    Cat(cat::CatArgs),

    /// Stream stdin into a leaf
    Pipe(pipe::PipeArgs),

    /// Copy a leaf or a tree
    Cp(cp::CpArgs),

    /// Move a leaf (copy then delete)
    Mv(mv::MvArgs),

    /// Remove leaves, directories or containers
    Rm(rm::RmArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            no_progress: self.no_progress,
            quiet: self.quiet,
        }
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = cli.output_config();

    match cli.command {
        Commands::Drive(cmd) => drive::execute(cmd, output_config),
        Commands::Ls(args) => ls::execute(args, output_config).await,
        Commands::Stat(args) => stat::execute(args, output_config).await,
        Commands::Test(args) => test_path::execute(args, output_config).await,
        Commands::Mkdir(args) => mkdir::execute(args, output_config).await,
        Commands::Touch(args) => touch::execute(args, output_config).await,
        Commands::Put(args) => put::execute(args, output_config).await,
        Commands::Cat(args) => cat::execute(args, output_config).await,
        Commands::Pipe(args) => pipe::execute(args, output_config).await,
        Commands::Cp(args) => cp::execute(args, output_config).await,
        Commands::Mv(args) => mv::execute(args, output_config).await,
        Commands::Rm(args) => rm::execute(args, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Drive name in front of the first `:` of a path
pub(crate) fn drive_name(path: &str) -> Result<&str> {
    match path.split_once(':') {
        Some((name, _)) if !name.is_empty() && !name.contains(['/', '\\']) => Ok(name),
        _ => Err(Error::PathInvalid(format!(
            "'{path}' does not start with a drive name (expected <drive>:/container/key)"
        ))),
    }
}

/// Drive name shared by every path of a command
pub(crate) fn common_drive<'a>(paths: &[&'a str]) -> Result<&'a str> {
    let mut names = paths.iter().map(|p| drive_name(*p));
    let first = names
        .next()
        .ok_or_else(|| Error::PathInvalid("no path given".into()))??;
    for name in names {
        let name = name?;
        if name != first {
            return Err(Error::Unsupported(format!(
                "paths span drives '{first}' and '{name}'"
            )));
        }
    }
    Ok(first)
}

/// Mount the named drive from its stored profile
pub(crate) async fn mount(name: &str) -> Result<DriveConnection> {
    let profiles = ProfileManager::new()?;
    let profile = profiles.get(name)?;
    let config = profiles.config_manager().load()?;
    let store = S3Store::new(&profile).await?;
    DriveConnection::mount(
        profile.mount_options(config.defaults.transfer),
        Arc::new(store),
    )
    .await
}

/// Release a drive after a command has finished with it
pub(crate) fn unmount(drive: DriveConnection) {
    if let Err(err) = drive.unmount() {
        tracing::warn!(open_sessions = err.open_sessions, "drive still busy at exit");
    }
}

/// Show the actions of a plan that was not applied
pub(crate) fn print_plan(formatter: &Formatter, plan: &Plan) {
    if formatter.is_json() {
        let actions: Vec<String> = plan.actions().iter().map(ToString::to_string).collect();
        formatter.json(&serde_json::json!({
            "status": "dry_run",
            "actions": actions,
        }));
        return;
    }
    if plan.is_empty() {
        formatter.println("Nothing to do.");
    }
    for action in plan.actions() {
        formatter.println(&format!("would {action}"));
    }
}

/// Print an engine error and pick its exit code
pub(crate) fn fail(formatter: &Formatter, err: &Error) -> ExitCode {
    formatter.error(&err.to_string());
    ExitCode::from(err)
}
