//! pipe command - Stream stdin into a leaf
//!
//! Reads stdin until end of input and commits it to the target leaf,
//! replacing any previous content.

use clap::Args;

use super::put::{UploadOutput, upload};
use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Stream stdin into a leaf
#[derive(Args, Debug)]
pub struct PipeArgs {
    /// Destination leaf (drive:/container/key)
    pub target: String,

    /// Content type for the uploaded object
    #[arg(long, default_value = "application/octet-stream")]
    pub content_type: String,
}

/// Execute the pipe command
pub async fn execute(args: PipeArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match drive_name(&args.target) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let spinner = ProgressBar::spinner(formatter.config().clone(), "reading stdin");
    let result = upload(
        &drive,
        &args.target,
        std::io::stdin().lock(),
        Some(args.content_type),
        &spinner,
    )
    .await;
    spinner.finish_and_clear();
    unmount(drive);

    match result {
        Ok(meta) => {
            let output = UploadOutput::new(&args.target, &meta);
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                formatter.success(&format!(
                    "Uploaded {} to {}",
                    output.size_human, args.target
                ));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}
