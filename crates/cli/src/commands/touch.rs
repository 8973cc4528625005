//! touch command - Create an item
//!
//! Creates an empty leaf by default; `--type` selects a container or
//! directory instead.

use clap::Args;

use bkd_core::{ItemType, crud};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create an item
#[derive(Args, Debug)]
pub struct TouchArgs {
    /// Path of the new item (drive:/container[/key])
    pub path: String,

    /// Item type: container, directory or leaf
    #[arg(long = "type", default_value = "leaf")]
    pub item_type: ItemType,

    /// Initial content for a leaf
    #[arg(long)]
    pub value: Option<String>,

    /// Replace an existing leaf
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the touch command
pub async fn execute(args: TouchArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if args.value.is_some() && args.item_type != ItemType::Leaf {
        formatter.error("--value only applies to leaves");
        return ExitCode::UsageError;
    }

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let body = args.value.map(bytes::Bytes::from);
    let result = crud::new_item(&drive, &args.path, args.item_type, body, args.force).await;
    unmount(drive);

    match result {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "status": "success",
                    "path": args.path,
                    "type": args.item_type,
                }));
            } else {
                formatter.success(&format!("Created {} '{}'", args.item_type, args.path));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}
