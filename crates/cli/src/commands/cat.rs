//! cat command - Print the content of a leaf
//!
//! Content is streamed chunk by chunk to stdout without buffering the
//! whole object.

use std::io::{self, Write};

use clap::Args;

use bkd_core::{DriveConnection, Error, Result, content};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Print the content of a leaf
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Leaf path (drive:/container/key)
    pub path: String,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let result = stream_to(&drive, &args.path, &mut io::stdout().lock()).await;
    unmount(drive);

    match result {
        Ok(_) => ExitCode::Success,
        Err(e) => fail(&formatter, &e),
    }
}

async fn stream_to(drive: &DriveConnection, path: &str, out: &mut impl Write) -> Result<u64> {
    let mut reader = content::open_reader(drive, path).await?;
    while let Some(chunk) = reader.next_chunk().await? {
        out.write_all(&chunk).map_err(Error::LocalIo)?;
    }
    out.flush()?;
    let written = reader.position();
    reader.close();
    Ok(written)
}
