//! Create, copy, move and remove over a flat key space
//!
//! Every mutating operation is split in two: a `plan_*` function that checks
//! the request against the store (reads only) and returns a [`Plan`], and
//! [`Plan::apply`] which performs the store writes in order. Hosts use
//! [`Plan::would_modify`] and [`Plan::actions`] for confirmation and dry runs.
//!
//! The store has no rename and no multi-object transactions. A plan stops at
//! the first failed action and nothing already applied is rolled back.

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::drive::DriveConnection;
use crate::error::{Error, Result, StoreError};
use crate::nav::{self, EntryKind};
use crate::path::{self, ParsedPath, SEPARATOR};
use crate::traits::ObjectStore;

/// Kind of item to create with [`new_item`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Container,
    Directory,
    Leaf,
}

impl std::str::FromStr for ItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "container" | "bucket" => Ok(ItemType::Container),
            "directory" | "dir" | "folder" => Ok(ItemType::Directory),
            "leaf" | "file" | "object" => Ok(ItemType::Leaf),
            other => Err(Error::Unsupported(format!("unknown item type '{other}'"))),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemType::Container => "container",
            ItemType::Directory => "directory",
            ItemType::Leaf => "leaf",
        })
    }
}

/// A single store write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateContainer {
        name: String,
    },
    Put {
        container: String,
        key: String,
        body: Bytes,
    },
    Copy {
        src_container: String,
        src_key: String,
        dst_container: String,
        dst_key: String,
    },
    Delete {
        container: String,
        key: String,
    },
    DeleteContainer {
        name: String,
    },
}

impl Action {
    async fn apply(&self, store: &dyn ObjectStore) -> Result<()> {
        self.run(store).await.map_err(|e| self.failure(e, false))
    }

    async fn run(&self, store: &dyn ObjectStore) -> std::result::Result<(), StoreError> {
        match self {
            Action::CreateContainer { name } => store.create_container(name).await,
            Action::Put {
                container,
                key,
                body,
            } => store
                .put_object(container, key, body.clone(), None)
                .await
                .map(|_| ()),
            Action::Copy {
                src_container,
                src_key,
                dst_container,
                dst_key,
            } => store
                .copy_object(src_container, src_key, dst_container, dst_key)
                .await
                .map(|_| ()),
            Action::Delete { container, key } => store.delete_object(container, key).await,
            Action::DeleteContainer { name } => store.delete_container(name).await,
        }
    }

    fn target(&self) -> (&'static str, String) {
        match self {
            Action::CreateContainer { name } => ("create container", name.clone()),
            Action::Put { container, key, .. } => ("put", path::join(container, key)),
            Action::Copy {
                src_container,
                src_key,
                ..
            } => ("copy", path::join(src_container, src_key)),
            Action::Delete { container, key } => ("delete", path::join(container, key)),
            Action::DeleteContainer { name } => ("delete container", name.clone()),
        }
    }

    /// Store "not found" keeps its own kind only while the plan has changed nothing
    fn failure(&self, source: StoreError, after_changes: bool) -> Error {
        if let (Action::CreateContainer { name }, StoreError::AlreadyExists(_)) = (self, &source) {
            return Error::AlreadyExists(name.clone());
        }
        let (operation, path) = self.target();
        if after_changes {
            Error::io(operation, path, source)
        } else {
            Error::from_store(operation, path, source)
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateContainer { name } => write!(f, "create container {name}"),
            Action::Put {
                container,
                key,
                body,
            } => write!(f, "put {container}/{key} ({} bytes)", body.len()),
            Action::Copy {
                src_container,
                src_key,
                dst_container,
                dst_key,
            } => write!(f, "copy {src_container}/{src_key} -> {dst_container}/{dst_key}"),
            Action::Delete { container, key } => write!(f, "delete {container}/{key}"),
            Action::DeleteContainer { name } => write!(f, "delete container {name}"),
        }
    }
}

/// Ordered store writes computed without side effects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Whether applying the plan would change anything in the store
    pub fn would_modify(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order, stopping at the first failure
    ///
    /// Returns the number of actions applied. Once an action has been applied,
    /// any later failure is reported as [`Error::Io`].
    pub async fn apply(self, drive: &DriveConnection) -> Result<usize> {
        let total = self.actions.len();
        for (applied, action) in self.actions.iter().enumerate() {
            tracing::debug!(%action, "applying");
            if let Err(e) = action.run(drive.store()).await {
                if applied > 0 {
                    tracing::warn!(
                        applied,
                        remaining = total - applied,
                        failed = %action,
                        "stopped part-way; applied actions were not rolled back"
                    );
                }
                return Err(action.failure(e, applied > 0));
            }
        }
        Ok(total)
    }
}

/// Create a container
pub async fn create_container(drive: &DriveConnection, name: &str) -> Result<()> {
    path::validate_name(name)?;
    if let Some(pinned) = drive.root_container()
        && pinned != name
    {
        return Err(Error::PathInvalid(format!(
            "drive is scoped to container '{pinned}'"
        )));
    }
    if nav::container_exists(drive, name).await? {
        return Err(Error::AlreadyExists(name.to_string()));
    }
    Action::CreateContainer {
        name: name.to_string(),
    }
    .apply(drive.store())
    .await
}

/// Plan writing `body` to a leaf path
pub async fn plan_create_leaf(
    drive: &DriveConnection,
    raw: &str,
    body: Bytes,
    overwrite: bool,
) -> Result<Plan> {
    let path = leaf_path(drive, raw)?;
    match nav::classify(drive, &path).await? {
        Some(EntryKind::SyntheticContainer) => {
            return Err(Error::AlreadyExists(format!(
                "{} is a directory",
                path.display()
            )));
        }
        Some(EntryKind::Leaf) if !overwrite => {
            return Err(Error::AlreadyExists(path.display()));
        }
        _ => {}
    }
    let mut plan = Plan::default();
    plan.push(Action::Put {
        key: path.key(),
        container: path.container,
        body,
    });
    Ok(plan)
}

/// Create a leaf with an initial payload
pub async fn create_leaf(
    drive: &DriveConnection,
    raw: &str,
    body: impl Into<Bytes>,
    overwrite: bool,
) -> Result<()> {
    plan_create_leaf(drive, raw, body.into(), overwrite)
        .await?
        .apply(drive)
        .await
        .map(|_| ())
}

/// Make a synthetic directory durable with a zero-byte `key/` marker
///
/// A container-only path creates the container instead.
pub async fn create_directory(drive: &DriveConnection, raw: &str) -> Result<()> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root {
        return Err(Error::AlreadyExists(drive.root().to_string()));
    }
    if path.is_container_only() {
        return create_container(drive, &path.container).await;
    }
    path.validate_names()?;
    if !nav::container_exists(drive, &path.container).await? {
        return Err(Error::NotFound(format!("container {}", path.container)));
    }
    if nav::classify(drive, &path).await?.is_some() {
        return Err(Error::AlreadyExists(path.display()));
    }
    Action::Put {
        key: path.prefix(),
        container: path.container,
        body: Bytes::new(),
    }
    .apply(drive.store())
    .await
}

/// Create a container, directory or leaf
pub async fn new_item(
    drive: &DriveConnection,
    raw: &str,
    item_type: ItemType,
    body: Option<Bytes>,
    overwrite: bool,
) -> Result<()> {
    match item_type {
        ItemType::Container => {
            let path = drive.resolve(raw)?;
            if !path.is_container_only() {
                return Err(Error::PathInvalid(format!(
                    "'{raw}' does not name a container"
                )));
            }
            create_container(drive, &path.container).await
        }
        ItemType::Directory => create_directory(drive, raw).await,
        ItemType::Leaf => create_leaf(drive, raw, body.unwrap_or_default(), overwrite).await,
    }
}

/// Plan a copy
///
/// A leaf is copied to `dst`, or under its own name when `dst` is a container
/// or an existing directory. A container or directory without `recurse` copies only its
/// existence (container or marker); with `recurse` every key below it is
/// copied to the same relative key below `dst`. Existing destinations fail
/// with [`Error::AlreadyExists`] unless `force` is set.
pub async fn plan_copy(
    drive: &DriveConnection,
    src: &str,
    dst: &str,
    recurse: bool,
    force: bool,
) -> Result<Plan> {
    let src = drive.resolve(src)?;
    let dst = drive.resolve(dst)?;
    if src.is_drive_root || dst.is_drive_root {
        return Err(Error::Unsupported("cannot copy to or from the drive root".into()));
    }

    match nav::classify(drive, &src).await? {
        None => Err(Error::NotFound(src.display())),
        Some(EntryKind::Leaf) => plan_leaf_copy(drive, &src, dst, force).await,
        Some(EntryKind::SyntheticContainer) if recurse => {
            plan_tree_copy(drive, &src, &dst, force).await
        }
        Some(EntryKind::SyntheticContainer) => plan_marker_copy(drive, &dst, force).await,
    }
}

/// Copy a leaf or container
pub async fn copy(
    drive: &DriveConnection,
    src: &str,
    dst: &str,
    recurse: bool,
    force: bool,
) -> Result<usize> {
    plan_copy(drive, src, dst, recurse, force)
        .await?
        .apply(drive)
        .await
}

/// Plan a leaf move: copy, then delete the source
///
/// Containers and directories cannot be moved. The destination must not exist.
pub async fn plan_move(drive: &DriveConnection, src: &str, dst: &str) -> Result<Plan> {
    let src = drive.resolve(src)?;
    let dst = drive.resolve(dst)?;
    if src.is_drive_root || src.is_container_only() {
        return Err(Error::Unsupported(format!(
            "cannot move container '{}'",
            src.display()
        )));
    }
    if dst.is_drive_root {
        return Err(Error::Unsupported("cannot move onto the drive root".into()));
    }

    match nav::classify(drive, &src).await? {
        None => Err(Error::NotFound(src.display())),
        Some(EntryKind::SyntheticContainer) => Err(Error::Unsupported(format!(
            "cannot move directory '{}'",
            src.display()
        ))),
        Some(EntryKind::Leaf) => {
            let mut plan = plan_leaf_copy(drive, &src, dst, false).await?;
            plan.push(Action::Delete {
                key: src.key(),
                container: src.container,
            });
            Ok(plan)
        }
    }
}

/// Move a leaf
///
/// When the source cannot be deleted after a successful copy the error is
/// returned and both copies remain.
pub async fn move_item(drive: &DriveConnection, src: &str, dst: &str) -> Result<()> {
    plan_move(drive, src, dst).await?.apply(drive).await.map(|_| ())
}

/// Plan a removal
///
/// A leaf is deleted. A container or directory holding leaves requires
/// `recurse`; its keys are deleted first, then the container itself.
pub async fn plan_remove(drive: &DriveConnection, raw: &str, recurse: bool) -> Result<Plan> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root {
        return Err(Error::Unsupported("cannot remove the drive root".into()));
    }

    let mut plan = Plan::default();
    if path.is_container_only() {
        if !nav::container_exists(drive, &path.container).await? {
            return Err(Error::NotFound(path.display()));
        }
    } else {
        match nav::classify(drive, &path).await? {
            None => return Err(Error::NotFound(path.display())),
            Some(EntryKind::Leaf) => {
                plan.push(Action::Delete {
                    key: path.key(),
                    container: path.container,
                });
                return Ok(plan);
            }
            Some(EntryKind::SyntheticContainer) => {}
        }
    }

    let keys: Vec<String> = nav::list_prefix(drive, &path)
        .await?
        .into_iter()
        .map(|meta| meta.key)
        .collect();
    if !recurse && keys.iter().any(|k| !k.ends_with(SEPARATOR)) {
        return Err(Error::NotEmpty(path.display()));
    }

    for key in keys {
        plan.push(Action::Delete {
            container: path.container.clone(),
            key,
        });
    }
    if path.is_container_only() {
        plan.push(Action::DeleteContainer {
            name: path.container,
        });
    }
    Ok(plan)
}

/// Remove a leaf, directory or container
pub async fn remove(drive: &DriveConnection, raw: &str, recurse: bool) -> Result<usize> {
    plan_remove(drive, raw, recurse).await?.apply(drive).await
}

/// Resolve a path that must address a leaf
pub(crate) fn leaf_path(drive: &DriveConnection, raw: &str) -> Result<ParsedPath> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root || path.is_container_only() {
        return Err(Error::PathInvalid(format!("'{raw}' does not name a leaf")));
    }
    path.validate_names()?;
    Ok(path)
}

async fn plan_leaf_copy(
    drive: &DriveConnection,
    src: &ParsedPath,
    dst: ParsedPath,
    force: bool,
) -> Result<Plan> {
    dst.validate_names()?;
    if !nav::container_exists(drive, &dst.container).await? {
        return Err(Error::NotFound(format!("container {}", dst.container)));
    }
    let into_directory = dst.is_container_only()
        || nav::classify(drive, &dst).await? == Some(EntryKind::SyntheticContainer);
    let dst = match (into_directory, src.leaf_name()) {
        (true, Some(name)) => dst.child(name),
        _ => dst,
    };
    dst.validate_names()?;
    if &dst == src {
        return Err(Error::Unsupported(format!(
            "'{}' cannot be copied onto itself",
            src.display()
        )));
    }
    if !force && nav::leaf_meta(drive, &dst).await?.is_some() {
        return Err(Error::AlreadyExists(dst.display()));
    }

    let mut plan = Plan::default();
    plan.push(Action::Copy {
        src_container: src.container.clone(),
        src_key: src.key(),
        dst_key: dst.key(),
        dst_container: dst.container,
    });
    Ok(plan)
}

async fn plan_marker_copy(drive: &DriveConnection, dst: &ParsedPath, force: bool) -> Result<Plan> {
    dst.validate_names()?;
    let mut plan = Plan::default();
    let container_exists = nav::container_exists(drive, &dst.container).await?;

    if dst.is_container_only() {
        if container_exists && !force {
            return Err(occupied(drive, dst).await?);
        }
        if !container_exists {
            plan.push(Action::CreateContainer {
                name: dst.container.clone(),
            });
        }
        return Ok(plan);
    }

    if !container_exists {
        return Err(Error::NotFound(format!("container {}", dst.container)));
    }
    match nav::classify(drive, dst).await? {
        Some(EntryKind::SyntheticContainer) if !force => return Err(occupied(drive, dst).await?),
        Some(EntryKind::Leaf) if !force => return Err(Error::AlreadyExists(dst.display())),
        _ => {}
    }
    plan.push(Action::Put {
        container: dst.container.clone(),
        key: dst.prefix(),
        body: Bytes::new(),
    });
    Ok(plan)
}

/// Error for an existing container or directory destination
async fn occupied(drive: &DriveConnection, dst: &ParsedPath) -> Result<Error> {
    let holds_leaves = nav::list_prefix(drive, dst)
        .await?
        .iter()
        .any(|meta| !meta.key.ends_with(SEPARATOR));
    Ok(if holds_leaves {
        Error::NotEmpty(dst.display())
    } else {
        Error::AlreadyExists(dst.display())
    })
}

async fn plan_tree_copy(
    drive: &DriveConnection,
    src: &ParsedPath,
    dst: &ParsedPath,
    force: bool,
) -> Result<Plan> {
    dst.validate_names()?;
    if dst.container == src.container
        && dst.key_segments.starts_with(&src.key_segments)
    {
        return Err(Error::Unsupported(format!(
            "cannot copy '{}' into itself",
            src.display()
        )));
    }

    let mut plan = Plan::default();
    let existing: HashSet<String> = if nav::container_exists(drive, &dst.container).await? {
        nav::list_prefix(drive, dst)
            .await?
            .into_iter()
            .map(|meta| meta.key)
            .collect()
    } else if dst.is_container_only() {
        plan.push(Action::CreateContainer {
            name: dst.container.clone(),
        });
        HashSet::new()
    } else {
        return Err(Error::NotFound(format!("container {}", dst.container)));
    };

    let src_prefix = src.prefix();
    for meta in nav::list_prefix(drive, src).await? {
        let Some(rel) = meta.key.strip_prefix(src_prefix.as_str()) else {
            continue;
        };
        let dst_key = if rel.is_empty() {
            dst.prefix()
        } else {
            path::join(&dst.key(), rel)
        };
        if dst_key.is_empty() {
            continue;
        }
        if !force && existing.contains(&dst_key) {
            return Err(Error::AlreadyExists(path::join(&dst.container, &dst_key)));
        }
        plan.push(Action::Copy {
            src_container: src.container.clone(),
            src_key: meta.key,
            dst_container: dst.container.clone(),
            dst_key,
        });
    }
    Ok(plan)
}
