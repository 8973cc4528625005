//! stat command - Show what a path resolves to

use clap::Args;

use bkd_core::{EntryKind, ObjectEntry, nav};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show what a path resolves to
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Drive path (drive:/container[/key])
    pub path: String,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let result = nav::stat(&drive, &args.path).await;
    unmount(drive);

    match result {
        Ok(entry) => {
            if formatter.is_json() {
                formatter.json(&entry);
            } else {
                for line in describe(&entry) {
                    formatter.println(&line);
                }
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}

fn describe(entry: &ObjectEntry) -> Vec<String> {
    let mut lines = vec![format!("Name      : {}", entry.name)];
    if !entry.path.is_empty() {
        lines.push(format!("Path      : {}", entry.path));
    }
    match entry.kind {
        EntryKind::SyntheticContainer => lines.push("Kind      : container".to_string()),
        EntryKind::Leaf => {
            lines.push("Kind      : leaf".to_string());
            lines.push(format!(
                "Size      : {} ({} bytes)",
                humansize::format_size(entry.size_bytes, humansize::BINARY),
                entry.size_bytes
            ));
            if !entry.etag.is_empty() {
                lines.push(format!("ETag      : {}", entry.etag));
            }
            if let Some(ct) = &entry.content_type {
                lines.push(format!("Type      : {ct}"));
            }
        }
    }
    if let Some(modified) = entry.last_modified {
        lines.push(format!(
            "Modified  : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines
}
