//! Integration tests for the bkd CLI
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! # Start an S3-compatible server, for example MinIO
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! # Run tests
//! BKD_TEST_ENDPOINT=http://localhost:9000 \
//! BKD_TEST_ACCESS_KEY=accesskey \
//! BKD_TEST_SECRET_KEY=secretkey \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tempfile::TempDir;

/// Run bkd with an isolated config directory
fn run_bkd(args: &[&str], config_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bkd"))
        .args(args)
        .env("BKD_CONFIG_DIR", config_dir)
        .output()
        .expect("Failed to execute bkd command")
}

/// Run bkd feeding `input` on stdin
fn run_bkd_with_stdin(args: &[&str], config_dir: &Path, input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_bkd"))
        .args(args)
        .env("BKD_CONFIG_DIR", config_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn bkd");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input)
        .expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for bkd")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("Invalid JSON output")
}

/// Get S3 test configuration from environment
fn get_test_config() -> Option<(String, String, String)> {
    let endpoint = std::env::var("BKD_TEST_ENDPOINT").ok()?;
    let access_key = std::env::var("BKD_TEST_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("BKD_TEST_SECRET_KEY").ok()?;
    Some((endpoint, access_key, secret_key))
}

/// Generate unique suffix for test resources
fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

/// Register the `test` drive and wait until the server answers
fn setup_drive() -> Option<TempDir> {
    let (endpoint, access_key, secret_key) = get_test_config()?;
    let config_dir = tempfile::tempdir().ok()?;

    let output = run_bkd(
        &[
            "drive",
            "set",
            "test",
            &endpoint,
            &access_key,
            &secret_key,
            "--bucket-lookup",
            "path",
        ],
        config_dir.path(),
    );
    if !output.status.success() {
        eprintln!("Failed to set drive: {}", stderr(&output));
        return None;
    }

    for _ in 0..30 {
        if run_bkd(&["ls", "test:", "--json"], config_dir.path())
            .status
            .success()
        {
            return Some(config_dir);
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    eprintln!("S3 service did not become ready in time");
    None
}

/// Register the drive and create a fresh container
fn setup_with_container(label: &str) -> Option<(TempDir, String)> {
    let config_dir = setup_drive()?;
    let container = format!("bkd-{label}-{}", uuid_suffix());

    let output = run_bkd(&["mkdir", &format!("test:/{container}")], config_dir.path());
    if !output.status.success() {
        eprintln!("Failed to create container: {}", stderr(&output));
        return None;
    }
    Some((config_dir, container))
}

fn cleanup_container(config_dir: &Path, container: &str) {
    let _ = run_bkd(
        &["rm", "--recursive", "--force", &format!("test:/{container}")],
        config_dir,
    );
}

mod drive_operations {
    use super::*;

    #[test]
    fn test_set_list_remove_drive() {
        let config_dir = tempfile::tempdir().expect("Failed to create temp dir");

        let output = run_bkd(
            &[
                "drive",
                "set",
                "helm",
                "http://localhost:9000",
                "access",
                "secret",
                "--container",
                "releases",
                "--json",
            ],
            config_dir.path(),
        );
        assert!(output.status.success(), "{}", stderr(&output));
        assert_eq!(json(&output)["drive"], "helm");

        let output = run_bkd(&["drive", "list", "--json"], config_dir.path());
        assert!(output.status.success());
        let listed = json(&output);
        assert_eq!(listed["drives"][0]["name"], "helm");
        assert_eq!(listed["drives"][0]["container"], "releases");
        assert!(listed["drives"][0].get("secret_key").is_none());

        let output = run_bkd(&["drive", "remove", "helm"], config_dir.path());
        assert!(output.status.success());

        let output = run_bkd(&["drive", "remove", "helm"], config_dir.path());
        assert_eq!(output.status.code(), Some(5));
    }

    #[test]
    fn test_invalid_drive_settings_are_usage_errors() {
        let config_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let output = run_bkd(
            &["drive", "set", "helm", "not a url", "a", "b"],
            config_dir.path(),
        );
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_unknown_drive_is_not_found() {
        let config_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let output = run_bkd(&["ls", "nowhere:/x"], config_dir.path());
        assert_eq!(output.status.code(), Some(5));

        let output = run_bkd(&["ls", "no-drive-prefix"], config_dir.path());
        assert_eq!(output.status.code(), Some(2));
    }
}

mod container_operations {
    use super::*;

    #[test]
    fn test_create_list_remove_container() {
        let Some((config_dir, container)) = setup_with_container("ctr") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };

        let output = run_bkd(&["ls", "test:", "--json"], config_dir.path());
        assert!(output.status.success());
        let items = json(&output)["items"].clone();
        assert!(
            items
                .as_array()
                .unwrap()
                .iter()
                .any(|i| i["name"] == container.as_str() && i["kind"] == "synthetic_container")
        );

        let output = run_bkd(
            &["test", "--container", &format!("test:/{container}")],
            config_dir.path(),
        );
        assert!(output.status.success());

        let output = run_bkd(&["rm", &format!("test:/{container}")], config_dir.path());
        assert!(output.status.success(), "{}", stderr(&output));

        let output = run_bkd(&["test", &format!("test:/{container}")], config_dir.path());
        assert_eq!(output.status.code(), Some(5));
    }

    #[test]
    fn test_remove_populated_container_needs_recursive() {
        let Some((config_dir, container)) = setup_with_container("full") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };

        let output = run_bkd(
            &["touch", &format!("test:/{container}/a.txt")],
            config_dir.path(),
        );
        assert!(output.status.success(), "{}", stderr(&output));

        let output = run_bkd(&["rm", &format!("test:/{container}")], config_dir.path());
        assert_eq!(output.status.code(), Some(6));

        let output = run_bkd(
            &["rm", "-r", "--force", &format!("test:/{container}")],
            config_dir.path(),
        );
        assert!(output.status.success(), "{}", stderr(&output));
    }
}

mod content_operations {
    use super::*;

    #[test]
    fn test_put_stat_cat_small_file() {
        let Some((config_dir, container)) = setup_with_container("small") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let target = format!("test:/{container}/docs/readme.txt");

        let temp_file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("Failed to create temp file");
        let content = "Hello, drive integration test!";
        std::fs::write(temp_file.path(), content).expect("Failed to write test file");

        let output = run_bkd(
            &["put", temp_file.path().to_str().unwrap(), &target, "--json"],
            config_dir.path(),
        );
        assert!(output.status.success(), "{}", stderr(&output));

        let output = run_bkd(&["stat", &target, "--json"], config_dir.path());
        assert!(output.status.success());
        let stat = json(&output);
        assert_eq!(stat["kind"], "leaf");
        assert_eq!(stat["size_bytes"], content.len() as u64);
        assert_eq!(stat["content_type"], "text/plain");

        let output = run_bkd(&["cat", &target], config_dir.path());
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), content);

        // a second put without --force conflicts
        let output = run_bkd(
            &["put", temp_file.path().to_str().unwrap(), &target],
            config_dir.path(),
        );
        assert_eq!(output.status.code(), Some(6));

        cleanup_container(config_dir.path(), &container);
    }

    #[test]
    fn test_put_large_file_staged() {
        let Some((config_dir, container)) = setup_with_container("large") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let target = format!("test:/{container}/large.bin");

        // 15 MiB crosses the default multipart threshold
        let file_size = 15 * 1024 * 1024;
        let pattern: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
        let temp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        {
            let mut file = std::fs::File::create(temp_file.path()).expect("Failed to create file");
            for _ in 0..(file_size / 1024) {
                file.write_all(&pattern).expect("Failed to write");
            }
        }

        let output = run_bkd(
            &["put", temp_file.path().to_str().unwrap(), &target, "--json"],
            config_dir.path(),
        );
        assert!(output.status.success(), "{}", stderr(&output));
        assert_eq!(json(&output)["size_bytes"], file_size as u64);

        let output = run_bkd(&["cat", &target], config_dir.path());
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), file_size);
        assert_eq!(&output.stdout[..1024], &pattern[..]);

        cleanup_container(config_dir.path(), &container);
    }

    #[test]
    fn test_pipe_from_stdin() {
        let Some((config_dir, container)) = setup_with_container("pipe") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let target = format!("test:/{container}/logs/today.log");

        let output = run_bkd_with_stdin(&["pipe", &target], config_dir.path(), b"line one\n");
        assert!(output.status.success(), "{}", stderr(&output));

        let output = run_bkd(&["cat", &target], config_dir.path());
        assert_eq!(output.stdout, b"line one\n");

        cleanup_container(config_dir.path(), &container);
    }
}

mod hierarchy_operations {
    use super::*;

    #[test]
    fn test_directories_are_listed_once() {
        let Some((config_dir, container)) = setup_with_container("dirs") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };

        for name in ["a.tgz", "b.tgz", "c.tgz"] {
            let output = run_bkd(
                &["touch", &format!("test:/{container}/charts/{name}")],
                config_dir.path(),
            );
            assert!(output.status.success(), "{}", stderr(&output));
        }

        let output = run_bkd(
            &["ls", &format!("test:/{container}"), "--json"],
            config_dir.path(),
        );
        assert!(output.status.success());
        let items = json(&output)["items"].as_array().unwrap().clone();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "charts");

        let output = run_bkd(
            &["ls", "-r", &format!("test:/{container}"), "--json"],
            config_dir.path(),
        );
        assert_eq!(json(&output)["items"].as_array().unwrap().len(), 4);

        cleanup_container(config_dir.path(), &container);
    }

    #[test]
    fn test_mkdir_parents_persists_empty_directories() {
        let Some((config_dir, container)) = setup_with_container("mkdir") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let deep = format!("test:/{container}/x1/y1/z1");

        let output = run_bkd(&["mkdir", "-p", &deep], config_dir.path());
        assert!(output.status.success(), "{}", stderr(&output));

        let output = run_bkd(&["test", "--container", &deep], config_dir.path());
        assert!(output.status.success());

        let output = run_bkd(&["test", "--leaf", &deep], config_dir.path());
        assert_eq!(output.status.code(), Some(5));

        cleanup_container(config_dir.path(), &container);
    }
}

mod copy_move_remove {
    use super::*;

    #[test]
    fn test_copy_respects_force() {
        let Some((config_dir, container)) = setup_with_container("copy") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let src = format!("test:/{container}/src.txt");
        let dst = format!("test:/{container}/dst.txt");

        run_bkd(&["touch", &src, "--value", "new"], config_dir.path());
        run_bkd(&["touch", &dst, "--value", "old"], config_dir.path());

        let output = run_bkd(&["cp", &src, &dst], config_dir.path());
        assert_eq!(output.status.code(), Some(6));
        let output = run_bkd(&["cat", &dst], config_dir.path());
        assert_eq!(output.stdout, b"old");

        let output = run_bkd(&["cp", "--force", &src, &dst], config_dir.path());
        assert!(output.status.success(), "{}", stderr(&output));
        let output = run_bkd(&["cat", &dst], config_dir.path());
        assert_eq!(output.stdout, b"new");

        cleanup_container(config_dir.path(), &container);
    }

    #[test]
    fn test_move_leaf_and_reject_container_move() {
        let Some((config_dir, container)) = setup_with_container("move") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let src = format!("test:/{container}/inbox/item.txt");
        let dst = format!("test:/{container}/archive/item.txt");

        run_bkd(&["touch", &src, "--value", "payload"], config_dir.path());

        let output = run_bkd(&["mv", "--dry-run", &src, &dst, "--json"], config_dir.path());
        assert!(output.status.success());
        assert_eq!(json(&output)["actions"].as_array().unwrap().len(), 2);
        assert!(run_bkd(&["test", &src], config_dir.path()).status.success());

        let output = run_bkd(&["mv", &src, &dst], config_dir.path());
        assert!(output.status.success(), "{}", stderr(&output));
        assert_eq!(
            run_bkd(&["test", &src], config_dir.path()).status.code(),
            Some(5)
        );
        assert_eq!(run_bkd(&["cat", &dst], config_dir.path()).stdout, b"payload");

        let output = run_bkd(
            &["mv", &format!("test:/{container}"), "test:/elsewhere"],
            config_dir.path(),
        );
        assert_eq!(output.status.code(), Some(7));

        cleanup_container(config_dir.path(), &container);
    }

    #[test]
    fn test_recursive_remove_dry_run_and_refusal() {
        let Some((config_dir, container)) = setup_with_container("rm") else {
            eprintln!("Skipping: S3 test config not available");
            return;
        };
        let dir = format!("test:/{container}/tree");
        for name in ["one", "two"] {
            run_bkd(&["touch", &format!("{dir}/{name}")], config_dir.path());
        }

        let output = run_bkd(&["rm", &dir], config_dir.path());
        assert_eq!(output.status.code(), Some(6));

        let output = run_bkd(&["rm", "-r", "--dry-run", &dir], config_dir.path());
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("would delete"));

        // no terminal to confirm on
        let output = run_bkd(&["rm", "-r", &dir], config_dir.path());
        assert_eq!(output.status.code(), Some(2));

        let output = run_bkd(&["rm", "-r", "--force", &dir], config_dir.path());
        assert!(output.status.success(), "{}", stderr(&output));
        assert_eq!(
            run_bkd(&["test", "--container", &dir], config_dir.path())
                .status
                .code(),
            Some(5)
        );

        cleanup_container(config_dir.path(), &container);
    }
}
