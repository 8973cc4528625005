//! test command - Check whether a path exists
//!
//! Exits 0 when the path exists and 5 (not found) when it does not, so it can
//! drive shell conditionals.

use clap::Args;
use serde::Serialize;

use bkd_core::{Error, nav};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Check whether a path exists
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Drive path (drive:/container[/key])
    pub path: String,

    /// Succeed only if the path is a container or directory
    #[arg(long, conflicts_with = "leaf")]
    pub container: bool,

    /// Succeed only if the path is a stored object
    #[arg(long)]
    pub leaf: bool,
}

#[derive(Debug, Serialize)]
struct TestOutput {
    path: String,
    exists: bool,
}

/// Execute the test command
pub async fn execute(args: TestArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let result = if args.container {
        nav::is_container_path(&drive, &args.path).await
    } else if args.leaf {
        match nav::stat(&drive, &args.path).await {
            Ok(entry) => Ok(!entry.is_container()),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    } else {
        nav::exists(&drive, &args.path).await
    };
    unmount(drive);

    let exists = match result {
        Ok(exists) => exists,
        Err(e) => return fail(&formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&TestOutput {
            path: args.path,
            exists,
        });
    } else {
        formatter.println(if exists { "True" } else { "False" });
    }

    if exists {
        ExitCode::Success
    } else {
        ExitCode::NotFound
    }
}
