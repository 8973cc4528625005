//! Navigation over a flat key space
//!
//! Existence checks, container/leaf classification and child listings. The
//! store only knows containers and full keys, so every directory seen here is
//! synthetic: a group of keys sharing the prefix `dir/`. Nothing is cached; each
//! call re-queries the store.

use std::collections::{HashSet, VecDeque};

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};

use crate::drive::DriveConnection;
use crate::error::{Error, Result};
use crate::path::{self, ParsedPath, SEPARATOR};
use crate::traits::ObjectMeta;

/// Lazily produced listing entries
pub type EntryStream<'a> = BoxStream<'a, Result<ObjectEntry>>;

/// What a listing entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A stored object
    Leaf,
    /// A container or a directory inferred from shared key prefixes
    SyntheticContainer,
}

/// One child produced by a listing or a stat call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Container holding the entry (empty for the drive root)
    pub container: String,
    /// Key inside the container, without trailing separator; empty for containers
    pub key: String,
    /// Child name (last path segment)
    pub name: String,
    /// Drive-relative path (`container/key`)
    pub path: String,
    pub size_bytes: u64,
    pub etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
    pub kind: EntryKind,
}

impl ObjectEntry {
    fn synthetic(container: &str, key: &str, name: &str) -> Self {
        Self {
            container: container.to_string(),
            key: key.to_string(),
            name: name.to_string(),
            path: path::join(container, key),
            size_bytes: 0,
            etag: String::new(),
            content_type: None,
            last_modified: None,
            kind: EntryKind::SyntheticContainer,
        }
    }

    /// Entry for the drive root itself
    pub fn drive_root(root: &str) -> Self {
        Self::synthetic("", "", root)
    }

    /// Entry for a container
    pub fn container(name: &str) -> Self {
        Self::synthetic(name, "", name)
    }

    /// Entry for a synthetic directory `key` inside `container`
    pub fn directory(container: &str, key: &str) -> Self {
        let name = key.rsplit(SEPARATOR).next().unwrap_or(key);
        Self::synthetic(container, key, name)
    }

    /// Entry for a stored object
    pub fn leaf(container: &str, meta: ObjectMeta) -> Self {
        let name = meta.key.rsplit(SEPARATOR).next().unwrap_or_default().to_string();
        Self {
            container: container.to_string(),
            path: path::join(container, &meta.key),
            key: meta.key,
            name,
            size_bytes: meta.size,
            etag: meta.etag,
            content_type: meta.content_type,
            last_modified: meta.last_modified,
            kind: EntryKind::Leaf,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind == EntryKind::SyntheticContainer
    }
}

/// Whether a path exists
///
/// The drive root always exists, a container-only path exists when the store
/// lists the container, any deeper path exists when an object has exactly that
/// key. Store failures other than "not found" propagate.
pub async fn exists(drive: &DriveConnection, raw: &str) -> Result<bool> {
    let path = drive.resolve(raw)?;
    exists_parsed(drive, &path).await
}

/// Whether a path is container-like: drive root, existing container, or a
/// prefix at least one stored key starts with
pub async fn is_container_path(drive: &DriveConnection, raw: &str) -> Result<bool> {
    let path = drive.resolve(raw)?;
    is_container_parsed(drive, &path).await
}

/// List the children of a path
///
/// The drive root yields one entry per container. A container or directory
/// yields one synthetic entry per distinct next segment and one leaf per object
/// directly below it. With `recursive`, descendants follow their parent
/// (depth-first) and each container's keys are listed exactly once.
pub fn list_children<'a>(
    drive: &'a DriveConnection,
    raw: &str,
    recursive: bool,
) -> Result<EntryStream<'a>> {
    let path = drive.resolve(raw)?;
    let start = if path.is_drive_root {
        Work::Containers
    } else {
        Work::Prefix(path)
    };
    Ok(walk(drive, start, recursive))
}

/// Last path segment, or the drive root string
pub fn child_name(drive: &DriveConnection, raw: &str) -> Result<String> {
    drive.resolver().child_name(raw)
}

/// Names of the immediate children
pub async fn child_names(drive: &DriveConnection, raw: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut children = list_children(drive, raw, false)?;
    while let Some(entry) = children.next().await {
        names.push(entry?.name);
    }
    Ok(names)
}

/// True iff the non-recursive listing yields at least one entry
pub async fn has_children(drive: &DriveConnection, raw: &str) -> Result<bool> {
    let mut children = list_children(drive, raw, false)?;
    match children.next().await {
        Some(Ok(_)) => Ok(true),
        Some(Err(e)) => Err(e),
        None => Ok(false),
    }
}

/// Describe whatever a path points at
pub async fn stat(drive: &DriveConnection, raw: &str) -> Result<ObjectEntry> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root {
        return Ok(ObjectEntry::drive_root(drive.root()));
    }
    if path.is_container_only() {
        return if container_exists(drive, &path.container).await? {
            Ok(ObjectEntry::container(&path.container))
        } else {
            Err(Error::NotFound(path.display()))
        };
    }
    if let Some(meta) = leaf_meta(drive, &path).await? {
        return Ok(ObjectEntry::leaf(&path.container, meta));
    }
    if is_container_parsed(drive, &path).await? {
        Ok(ObjectEntry::directory(&path.container, &path.key()))
    } else {
        Err(Error::NotFound(path.display()))
    }
}

pub(crate) async fn exists_parsed(drive: &DriveConnection, path: &ParsedPath) -> Result<bool> {
    if path.is_drive_root {
        return Ok(true);
    }
    if path.is_container_only() {
        return container_exists(drive, &path.container).await;
    }
    Ok(leaf_meta(drive, path).await?.is_some())
}

pub(crate) async fn is_container_parsed(drive: &DriveConnection, path: &ParsedPath) -> Result<bool> {
    if path.is_drive_root {
        return Ok(true);
    }
    if path.is_container_only() {
        return container_exists(drive, &path.container).await;
    }
    match list_prefix(drive, path).await {
        Ok(objects) => Ok(!objects.is_empty()),
        Err(Error::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Leaf wins when a key is both an object and a prefix of other keys
pub(crate) async fn classify(drive: &DriveConnection, path: &ParsedPath) -> Result<Option<EntryKind>> {
    if !path.is_drive_root
        && !path.is_container_only()
        && leaf_meta(drive, path).await?.is_some()
    {
        return Ok(Some(EntryKind::Leaf));
    }
    Ok(is_container_parsed(drive, path)
        .await?
        .then_some(EntryKind::SyntheticContainer))
}

pub(crate) async fn container_exists(drive: &DriveConnection, name: &str) -> Result<bool> {
    let containers = drive
        .store()
        .list_containers()
        .await
        .map_err(|e| Error::io("list containers", name, e))?;
    Ok(containers.iter().any(|c| c.name == name))
}

pub(crate) async fn leaf_meta(drive: &DriveConnection, path: &ParsedPath) -> Result<Option<ObjectMeta>> {
    match drive.store().head_object(&path.container, &path.key()).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(Error::io("head", path.display(), e)),
    }
}

/// Every object below a container or directory path
pub(crate) async fn list_prefix(drive: &DriveConnection, path: &ParsedPath) -> Result<Vec<ObjectMeta>> {
    drive
        .store()
        .list_objects(&path.container, &path.prefix())
        .await
        .map_err(|e| Error::from_store("list", path.display(), e))
}

enum Work {
    Containers,
    Prefix(ParsedPath),
}

enum Item {
    Entry(ObjectEntry),
    Work(Work),
}

fn walk(drive: &DriveConnection, start: Work, recursive: bool) -> EntryStream<'_> {
    let queue = VecDeque::from([Item::Work(start)]);
    stream::unfold(queue, move |mut queue| async move {
        loop {
            match queue.pop_front()? {
                Item::Entry(entry) => return Some((Ok(entry), queue)),
                Item::Work(work) => match expand(drive, work, recursive).await {
                    Ok(items) => {
                        for item in items.into_iter().rev() {
                            queue.push_front(item);
                        }
                    }
                    Err(e) => {
                        queue.clear();
                        return Some((Err(e), queue));
                    }
                },
            }
        }
    })
    .boxed()
}

async fn expand(drive: &DriveConnection, work: Work, recursive: bool) -> Result<Vec<Item>> {
    match work {
        Work::Containers => {
            let containers = drive
                .store()
                .list_containers()
                .await
                .map_err(|e| Error::io("list containers", drive.root(), e))?;
            let mut items = Vec::new();
            for container in containers
                .into_iter()
                .filter(|c| drive.root_container().is_none_or(|pinned| pinned == c.name))
            {
                items.push(Item::Entry(ObjectEntry::container(&container.name)));
                if recursive {
                    items.push(Item::Work(Work::Prefix(ParsedPath::container(
                        container.name,
                    ))));
                }
            }
            Ok(items)
        }
        Work::Prefix(path) => {
            let objects = list_prefix(drive, &path).await?;
            tracing::debug!(path = %path, objects = objects.len(), "listed prefix");
            Ok(group_children(&path, objects, recursive)
                .into_iter()
                .map(Item::Entry)
                .collect())
        }
    }
}

/// Turn a flat, key-ordered listing under `parent` into child entries
///
/// Each synthetic directory is emitted once, before the first key below it.
/// Directory markers (keys ending in the separator) make their directory
/// appear but are never emitted as leaves.
fn group_children(parent: &ParsedPath, objects: Vec<ObjectMeta>, recursive: bool) -> Vec<ObjectEntry> {
    let prefix = parent.prefix();
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for meta in objects {
        let Some(rel) = meta.key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let segments: Vec<&str> = rel.split(SEPARATOR).collect();
        let (leaf, dirs) = match segments.split_last() {
            Some((leaf, dirs)) => (*leaf, dirs),
            None => continue,
        };
        if dirs.iter().any(|d| d.is_empty()) {
            tracing::debug!(key = %meta.key, "skipping key with an empty segment");
            continue;
        }

        let depth = if recursive { dirs.len() } else { dirs.len().min(1) };
        let mut dir_key = parent.key();
        for dir in &dirs[..depth] {
            dir_key = path::join(&dir_key, dir);
            if seen.insert(dir_key.clone()) {
                entries.push(ObjectEntry::directory(&parent.container, &dir_key));
            }
        }

        if !leaf.is_empty() && (dirs.is_empty() || recursive) {
            entries.push(ObjectEntry::leaf(&parent.container, meta));
        }
    }

    entries
}
