//! ls command - List the children of a path
//!
//! The drive root lists containers, a container or directory lists the
//! synthetic directories and leaves directly below it. With `--recursive`
//! every descendant is listed, depth first.

use clap::Args;
use futures::TryStreamExt;
use serde::Serialize;

use bkd_core::{Error, ObjectEntry, nav};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// List the children of a path
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Drive path (drive:, drive:/container or drive:/container/dir)
    pub path: String,

    /// List every descendant
    #[arg(short, long)]
    pub recursive: bool,

    /// Only show entries whose name matches this glob
    #[arg(long)]
    pub name: Option<String>,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<ObjectEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_containers: usize,
    total_leaves: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn of(entries: &[ObjectEntry]) -> Self {
        let leaves = entries.iter().filter(|e| !e.is_container());
        let total_size_bytes: u64 = leaves.clone().map(|e| e.size_bytes).sum();
        Self {
            total_containers: entries.iter().filter(|e| e.is_container()).count(),
            total_leaves: leaves.count(),
            total_size_bytes,
            total_size_human: humansize::format_size(total_size_bytes, humansize::BINARY),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let pattern = match args.name.as_deref().map(glob::Pattern::new).transpose() {
        Ok(pattern) => pattern,
        Err(e) => {
            formatter.error(&format!("Invalid name pattern: {e}"));
            return ExitCode::UsageError;
        }
    };

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let spinner = ProgressBar::spinner(formatter.config().clone(), "listing");
    let listed = collect(&drive, &args.path, args.recursive).await;
    spinner.finish_and_clear();
    unmount(drive);

    let mut entries = match listed {
        Ok(entries) => entries,
        Err(e) => return fail(&formatter, &e),
    };
    if let Some(pattern) = &pattern {
        entries.retain(|e| pattern.matches(&e.name));
    }

    if formatter.is_json() {
        let summary = args.summarize.then(|| Summary::of(&entries));
        formatter.json(&LsOutput {
            items: entries,
            summary,
        });
        return ExitCode::Success;
    }

    if !args.summarize {
        for entry in &entries {
            formatter.println(&entry_line(&formatter, entry, args.recursive));
        }
    }

    let summary = Summary::of(&entries);
    if args.summarize || args.recursive {
        formatter.println(&format!(
            "\nTotal: {} containers, {} leaves, {}",
            summary.total_containers, summary.total_leaves, summary.total_size_human
        ));
    }

    ExitCode::Success
}

async fn collect(
    drive: &bkd_core::DriveConnection,
    path: &str,
    recursive: bool,
) -> Result<Vec<ObjectEntry>, Error> {
    nav::list_children(drive, path, recursive)?.try_collect().await
}

fn entry_line(formatter: &Formatter, entry: &ObjectEntry, recursive: bool) -> String {
    let date = entry
        .last_modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    let shown = if recursive { &entry.path } else { &entry.name };

    if entry.is_container() {
        format!("[{date}] {:>10} {}/", "", formatter.container_name(shown))
    } else {
        let size = humansize::format_size(entry.size_bytes, humansize::BINARY);
        format!("[{date}] {size:>10} {shown}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkd_core::ObjectMeta;

    fn plain() -> Formatter {
        Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_entry_line_marks_directories() {
        let entry = ObjectEntry::directory("releases", "charts/stable");
        let line = entry_line(&plain(), &entry, false);
        assert!(line.ends_with(" stable/"));

        let line = entry_line(&plain(), &entry, true);
        assert!(line.ends_with(" releases/charts/stable/"));
    }

    #[test]
    fn test_entry_line_shows_leaf_size() {
        let entry = ObjectEntry::leaf("releases", ObjectMeta::new("charts/a.tgz", 2048, "e"));
        let line = entry_line(&plain(), &entry, false);
        assert!(line.contains("2 KiB"));
        assert!(line.ends_with(" a.tgz"));
    }

    #[test]
    fn test_summary_counts() {
        let entries = vec![
            ObjectEntry::container("releases"),
            ObjectEntry::leaf("releases", ObjectMeta::new("a", 1024, "e")),
            ObjectEntry::leaf("releases", ObjectMeta::new("b", 1024, "e")),
        ];
        let summary = Summary::of(&entries);
        assert_eq!(summary.total_containers, 1);
        assert_eq!(summary.total_leaves, 2);
        assert_eq!(summary.total_size_bytes, 2048);
        assert_eq!(summary.total_size_human, "2 KiB");
    }
}
