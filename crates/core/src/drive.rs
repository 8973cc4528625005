//! Drive connections
//!
//! A [`DriveConnection`] is the mounted scope every engine call receives: the
//! drive root used to resolve paths, an optional pinned container, the store
//! handle and the upload settings. It is created by [`DriveConnection::mount`]
//! and released by [`DriveConnection::unmount`], which refuses to run while
//! content sessions opened on the drive are still alive.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::error::{Error, Result};
use crate::path::{self, ParsedPath, PathResolver};
use crate::traits::ObjectStore;
use crate::transfer::TransferConfig;

/// Parameters for mounting a drive
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    /// Drive root as written by the host (for example `helm:`); may be empty
    pub root: String,
    /// Restrict the drive to a single container
    pub container: Option<String>,
    /// Project or account the drive is scoped to
    pub scope_id: Option<String>,
    /// Maximum number of key segments below a container
    pub max_depth: Option<usize>,
    /// Upload settings for content writers
    pub transfer: TransferConfig,
}

impl MountOptions {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn scope_id(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }
}

/// A mounted drive
pub struct DriveConnection {
    resolver: PathResolver,
    root_container: Option<String>,
    scope_id: Option<String>,
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    sessions: Arc<AtomicUsize>,
}

impl fmt::Debug for DriveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveConnection")
            .field("root", &self.resolver.root())
            .field("root_container", &self.root_container)
            .field("scope_id", &self.scope_id)
            .field("open_sessions", &self.open_sessions())
            .finish_non_exhaustive()
    }
}

/// Unmount refused because content sessions are still open
///
/// The connection is handed back so the caller can close the sessions and retry.
#[derive(Error)]
#[error("cannot unmount drive: {open_sessions} content session(s) still open")]
pub struct UnmountError {
    pub drive: DriveConnection,
    pub open_sessions: usize,
}

impl fmt::Debug for UnmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmountError")
            .field("open_sessions", &self.open_sessions)
            .finish_non_exhaustive()
    }
}

impl From<UnmountError> for Error {
    fn from(err: UnmountError) -> Self {
        Error::Busy(err.to_string())
    }
}

impl DriveConnection {
    /// Mount a drive on top of a store handle
    ///
    /// With a pinned container the container must exist; otherwise the store
    /// must answer a container listing.
    pub async fn mount(options: MountOptions, store: Arc<dyn ObjectStore>) -> Result<Self> {
        if !options.root.is_empty() && !path::is_valid_syntax(&options.root) {
            return Err(Error::PathInvalid(format!(
                "drive root '{}' is not a valid path",
                options.root
            )));
        }

        if let Some(container) = &options.container {
            path::validate_name(container)?;
        }

        let containers = store
            .list_containers()
            .await
            .map_err(|e| Error::io("mount", options.root.clone(), e))?;

        if let Some(container) = &options.container
            && !containers.iter().any(|c| &c.name == container)
        {
            return Err(Error::NotFound(format!("container {container}")));
        }

        tracing::debug!(
            root = %options.root,
            container = ?options.container,
            scope = ?options.scope_id,
            "mounted drive"
        );

        Ok(Self {
            resolver: PathResolver::new(&options.root).with_max_depth(options.max_depth),
            root_container: options.container,
            scope_id: options.scope_id,
            store,
            transfer: options.transfer,
            sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Release the store handle
    pub fn unmount(self) -> std::result::Result<(), UnmountError> {
        let open_sessions = self.open_sessions();
        if open_sessions > 0 {
            return Err(UnmountError {
                drive: self,
                open_sessions,
            });
        }
        tracing::debug!(root = %self.resolver.root(), "unmounted drive");
        Ok(())
    }

    /// Drive root as normalized by the resolver
    pub fn root(&self) -> &str {
        self.resolver.root()
    }

    pub fn root_container(&self) -> Option<&str> {
        self.root_container.as_deref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn transfer(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Number of content sessions currently open on this drive
    pub fn open_sessions(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }

    /// Parse a path and check that it stays inside the drive's scope
    pub fn resolve(&self, raw: &str) -> Result<ParsedPath> {
        let parsed = self.resolver.parse(raw)?;
        if let Some(pinned) = &self.root_container
            && !parsed.is_drive_root
            && &parsed.container != pinned
        {
            return Err(Error::PathInvalid(format!(
                "'{raw}' is outside container '{pinned}' this drive is scoped to"
            )));
        }
        Ok(parsed)
    }

    pub(crate) fn store_handle(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub(crate) fn open_session(&self) -> SessionGuard {
        self.sessions.fetch_add(1, Ordering::AcqRel);
        SessionGuard(Arc::clone(&self.sessions))
    }
}

/// Keeps a drive's session count up while a content session lives
#[derive(Debug)]
pub(crate) struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::{MemoryStore, StoreOp};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_containers(["releases", "archive"]))
    }

    #[tokio::test]
    async fn test_mount_unscoped() {
        let drive = DriveConnection::mount(MountOptions::new("helm:"), store())
            .await
            .unwrap();
        assert_eq!(drive.root(), "helm:");
        assert!(drive.root_container().is_none());
        assert_eq!(drive.open_sessions(), 0);
        drive.unmount().unwrap();
    }

    #[tokio::test]
    async fn test_mount_pinned_container_must_exist() {
        let err = DriveConnection::mount(MountOptions::new("").container("missing"), store())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mount_reports_unreachable_store() {
        let store = store();
        store.inject_fault(
            StoreOp::ListContainers,
            "",
            StoreError::Transport("connection refused".into()),
        );
        let err = DriveConnection::mount(MountOptions::new("helm:"), store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { operation: "mount", .. }));
    }

    #[tokio::test]
    async fn test_mount_rejects_bad_root() {
        let err = DriveConnection::mount(MountOptions::new("a//b"), store())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathInvalid(_)));
    }

    #[tokio::test]
    async fn test_resolve_respects_pinned_container() {
        let drive = DriveConnection::mount(MountOptions::new("").container("releases"), store())
            .await
            .unwrap();
        assert!(drive.resolve("releases/charts/a.tgz").is_ok());
        assert!(drive.resolve("/").unwrap().is_drive_root);
        assert!(matches!(
            drive.resolve("archive/a.tgz"),
            Err(Error::PathInvalid(_))
        ));
    }

    #[tokio::test]
    async fn test_unmount_refused_while_session_open() {
        let drive = DriveConnection::mount(MountOptions::new(""), store())
            .await
            .unwrap();
        let guard = drive.open_session();
        assert_eq!(drive.open_sessions(), 1);

        let err = drive.unmount().unwrap_err();
        assert_eq!(err.open_sessions, 1);

        let drive = err.drive;
        drop(guard);
        assert_eq!(drive.open_sessions(), 0);
        drive.unmount().unwrap();
    }
}
