//! put command - Upload a local file to a leaf
//!
//! The file is streamed into a content writer; large payloads are committed as
//! a staged upload once the writer is closed.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use bkd_core::{DriveConnection, Error, ObjectMeta, Result, content, nav};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

const READ_CHUNK: usize = 64 * 1024;

/// Upload a local file to a leaf
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination leaf (drive:/container/key)
    pub target: String,

    /// Replace an existing leaf
    #[arg(short, long)]
    pub force: bool,

    /// Content type (guessed from the file name by default)
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Result of an upload (JSON format)
#[derive(Debug, Serialize)]
pub(crate) struct UploadOutput {
    pub status: &'static str,
    pub target: String,
    pub size_bytes: u64,
    pub size_human: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub etag: String,
}

impl UploadOutput {
    pub(crate) fn new(target: &str, meta: &ObjectMeta) -> Self {
        Self {
            status: "success",
            target: target.to_string(),
            size_bytes: meta.size,
            size_human: humansize::format_size(meta.size, humansize::BINARY),
            etag: meta.etag.clone(),
        }
    }
}

/// Execute the put command
pub async fn execute(args: PutArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let file = match std::fs::File::open(&args.source) {
        Ok(file) => file,
        Err(e) => {
            formatter.error(&format!("Failed to read {}: {e}", args.source.display()));
            return ExitCode::GeneralError;
        }
    };
    let total = file.metadata().map(|m| m.len()).unwrap_or(0);

    let content_type = args.content_type.clone().or_else(|| {
        mime_guess::from_path(&args.source)
            .first()
            .map(|m| m.essence_str().to_string())
    });

    let drive = match drive_name(&args.target) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let progress = ProgressBar::new(formatter.config().clone(), total);
    let result = put(&drive, &args, file, content_type, &progress).await;
    progress.finish_and_clear();
    unmount(drive);

    match result {
        Ok(meta) => {
            let output = UploadOutput::new(&args.target, &meta);
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                formatter.println(&format!(
                    "{} -> {} ({})",
                    args.source.display(),
                    args.target,
                    output.size_human
                ));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}

async fn put(
    drive: &DriveConnection,
    args: &PutArgs,
    file: std::fs::File,
    content_type: Option<String>,
    progress: &ProgressBar,
) -> Result<ObjectMeta> {
    if !args.force && nav::exists(drive, &args.target).await? {
        return Err(Error::AlreadyExists(args.target.clone()));
    }
    upload(drive, &args.target, file, content_type, progress).await
}

/// Stream a local reader into a leaf and commit it
pub(crate) async fn upload(
    drive: &DriveConnection,
    target: &str,
    mut source: impl Read,
    content_type: Option<String>,
    progress: &ProgressBar,
) -> Result<ObjectMeta> {
    let mut writer = content::open_writer(drive, target).await?;
    if let Some(content_type) = content_type {
        writer = writer.with_content_type(content_type);
    }

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                writer.abort();
                return Err(Error::LocalIo(e));
            }
        };
        writer.write_all(&chunk[..n])?;
        progress.inc(n as u64);
    }

    writer.close().await
}
