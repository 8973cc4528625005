//! rm command - Remove leaves, directories or containers
//!
//! Without `--recursive` only leaves, empty directories and empty containers
//! can be removed. Recursive removals that touch more than one object ask
//! for confirmation unless `--force` is given.

use clap::Args;
use serde::Serialize;

use bkd_core::{DriveConnection, Error, crud};

use super::{common_drive, fail, mount, print_plan, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove leaves, directories or containers
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Paths to remove (drive:/container[/key])
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Remove everything below a container or directory
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip confirmation and ignore missing paths
    #[arg(short, long)]
    pub force: bool,

    /// Only show what would be removed (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    removed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
    total_actions: usize,
}

/// What happened to one path
enum Outcome {
    Removed(usize),
    Skipped,
    /// Needs confirmation but nobody can answer
    Refused(usize),
}

/// Execute the rm command
pub async fn execute(args: RmArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let paths: Vec<&str> = args.paths.iter().map(String::as_str).collect();
    let drive = match common_drive(&paths) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let mut removed = Vec::new();
    let mut failed = Vec::new();
    let mut total_actions = 0;
    let mut exit_code = ExitCode::Success;

    for path in &args.paths {
        match remove_one(&drive, path, &args, &formatter).await {
            Ok(Outcome::Removed(actions)) => {
                total_actions += actions;
                removed.push(path.clone());
            }
            Ok(Outcome::Skipped) => {}
            Ok(Outcome::Refused(actions)) => {
                formatter.error(&format!(
                    "refusing to remove {actions} objects under '{path}' without --force"
                ));
                exit_code = ExitCode::UsageError;
                failed.push(path.clone());
                break;
            }
            Err(e) => {
                exit_code = fail(&formatter, &e);
                failed.push(path.clone());
                if matches!(exit_code, ExitCode::AuthError | ExitCode::UsageError) {
                    break;
                }
            }
        }
    }
    unmount(drive);

    if args.dry_run {
        return exit_code;
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            removed,
            failed,
            total_actions,
        });
    } else {
        for path in &removed {
            formatter.println(&format!("Removed: {path}"));
        }
    }

    exit_code
}

async fn remove_one(
    drive: &DriveConnection,
    path: &str,
    args: &RmArgs,
    formatter: &Formatter,
) -> Result<Outcome, Error> {
    let plan = match crud::plan_remove(drive, path, args.recursive).await {
        Ok(plan) => plan,
        Err(Error::NotFound(_)) if args.force => return Ok(Outcome::Skipped),
        Err(e) => return Err(e),
    };

    if args.dry_run {
        print_plan(formatter, &plan);
        return Ok(Outcome::Skipped);
    }

    if needs_confirmation(args, plan.len()) {
        if formatter.is_json() || !console::user_attended_stderr() {
            return Ok(Outcome::Refused(plan.len()));
        }
        if !formatter.confirm(&format!("Remove {} objects under '{path}'?", plan.len())) {
            formatter.warning(&format!("Skipped {path}"));
            return Ok(Outcome::Skipped);
        }
    }

    let actions = plan.apply(drive).await?;
    Ok(Outcome::Removed(actions))
}

fn needs_confirmation(args: &RmArgs, actions: usize) -> bool {
    args.recursive && !args.force && actions > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(recursive: bool, force: bool) -> RmArgs {
        RmArgs {
            paths: vec!["helm:/releases".into()],
            recursive,
            force,
            dry_run: false,
        }
    }

    #[test]
    fn test_confirmation_only_for_recursive_batches() {
        assert!(needs_confirmation(&args(true, false), 3));
        assert!(!needs_confirmation(&args(true, false), 1));
        assert!(!needs_confirmation(&args(true, true), 3));
        assert!(!needs_confirmation(&args(false, false), 3));
    }
}
