//! mkdir command - Create a container or directory
//!
//! `drive:/name` creates a container; deeper paths write a directory marker
//! so the directory survives without any leaf below it.

use clap::Args;

use bkd_core::{DriveConnection, Error, Result, crud, nav};

use super::{drive_name, fail, mount, unmount};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a container or directory
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Path to create (drive:/container[/dir...])
    pub path: String,

    /// Create missing parents and ignore existing directories
    #[arg(short, long)]
    pub parents: bool,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let drive = match drive_name(&args.path) {
        Ok(name) => match mount(name).await {
            Ok(drive) => drive,
            Err(e) => return fail(&formatter, &e),
        },
        Err(e) => return fail(&formatter, &e),
    };

    let result = if args.parents {
        make_parents(&drive, &args.path).await
    } else {
        crud::create_directory(&drive, &args.path).await
    };
    unmount(drive);

    match result {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "status": "success",
                    "path": args.path,
                }));
            } else {
                formatter.success(&format!("Created '{}'", args.path));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &e),
    }
}

/// Create every missing level from the container down to `raw`
async fn make_parents(drive: &DriveConnection, raw: &str) -> Result<()> {
    let target = drive.resolve(raw)?;
    if target.is_drive_root {
        return Ok(());
    }

    let mut levels = vec![target.display()];
    let mut current = target;
    while let Some(parent) = current.parent()
        && !parent.is_drive_root
    {
        levels.push(parent.display());
        current = parent;
    }

    for level in levels.into_iter().rev() {
        if nav::is_container_path(drive, &level).await? {
            continue;
        }
        match crud::create_directory(drive, &level).await {
            Ok(()) | Err(Error::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bkd_core::{MemoryStore, MountOptions};

    #[tokio::test]
    async fn test_make_parents_creates_every_level() {
        let store = Arc::new(MemoryStore::new());
        let drive = DriveConnection::mount(MountOptions::new("helm:"), Arc::<MemoryStore>::clone(&store))
            .await
            .unwrap();

        make_parents(&drive, "helm:/releases/charts/stable")
            .await
            .unwrap();
        assert!(store.has_container("releases"));
        assert_eq!(
            store.keys("releases"),
            vec!["charts/", "charts/stable/"]
        );

        // second run is a no-op
        make_parents(&drive, "helm:/releases/charts/stable")
            .await
            .unwrap();
        assert_eq!(store.keys("releases").len(), 2);
    }
}
