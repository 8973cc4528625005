//! mv command - Move a leaf
//!
//! A move is a copy followed by a delete of the source. Containers and
//! directories cannot be moved.

use clap::Args;
use serde::Serialize;

use bkd_core::crud;

use super::{common_drive, fail, mount, print_plan, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Move a leaf
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source leaf (drive:/container/key)
    pub source: String,

    /// Target leaf (drive:/container/key)
    pub target: String,

    /// Only show what would be moved (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct MvOutput {
    status: &'static str,
    source: String,
    target: String,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match common_drive(&[args.source.as_str(), args.target.as_str()]) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let plan = match crud::plan_move(&drive, &args.source, &args.target).await {
        Ok(plan) => plan,
        Err(e) => {
            unmount(drive);
            return fail(&formatter, &e);
        }
    };

    if args.dry_run {
        unmount(drive);
        print_plan(&formatter, &plan);
        return ExitCode::Success;
    }

    let result = plan.apply(&drive).await;
    unmount(drive);

    match result {
        Ok(_) => {
            if formatter.is_json() {
                formatter.json(&MvOutput {
                    status: "success",
                    source: args.source,
                    target: args.target,
                });
            } else {
                formatter.println(&format!("{} -> {}", args.source, args.target));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}
