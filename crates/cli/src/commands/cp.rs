//! cp command - Copy a leaf or a tree
//!
//! Source and target must live on the same drive. Copies run server-side;
//! no payload passes through the client.

use clap::Args;
use serde::Serialize;

use bkd_core::crud;

use super::{common_drive, fail, mount, print_plan, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy a leaf or a tree
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path (drive:/container[/key])
    pub source: String,

    /// Target path (drive:/container[/key])
    pub target: String,

    /// Copy every key below a container or directory
    #[arg(short, long)]
    pub recursive: bool,

    /// Overwrite existing leaves
    #[arg(short, long)]
    pub force: bool,

    /// Only show what would be copied (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    actions: usize,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match common_drive(&[args.source.as_str(), args.target.as_str()]) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let plan = match crud::plan_copy(
        &drive,
        &args.source,
        &args.target,
        args.recursive,
        args.force,
    )
    .await
    {
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
        Ok(actions) => {
            if formatter.is_json() {
                formatter.json(&CpOutput {
                    status: "success",
                    source: args.source,
                    target: args.target,
                    actions,
                });
            } else {
                formatter.println(&format!("{} -> {}", args.source, args.target));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}
