//! In-memory object store
//!
//! A complete [`ObjectStore`] kept in a `BTreeMap`, used by the test suites and
//! by hosts that want a scratch drive. Faults can be injected per operation and
//! target so partial-failure paths can be exercised deterministically.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::error::StoreError;
use crate::traits::{
    ByteStream, CompletedPart, ContainerInfo, ObjectMeta, ObjectStore, StoreResult,
};

/// Chunk size used when streaming payloads back
const STREAM_CHUNK: usize = 64 * 1024;

/// Store operations that can be counted and faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListContainers,
    ListObjects,
    Head,
    Get,
    Put,
    Copy,
    Delete,
    CreateContainer,
    DeleteContainer,
    CreateUpload,
    UploadPart,
    CompleteUpload,
    AbortUpload,
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    target: String,
    error: StoreError,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: jiff::Timestamp,
}

impl StoredObject {
    fn new(data: Bytes, content_type: Option<String>) -> Self {
        let etag = etag_for(&data);
        Self {
            data,
            content_type,
            etag,
            last_modified: jiff::Timestamp::now(),
        }
    }

    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.data.len() as u64,
            etag: self.etag.clone(),
            content_type: self.content_type.clone(),
            last_modified: Some(self.last_modified),
        }
    }
}

#[derive(Debug)]
struct PendingUpload {
    container: String,
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    faults: Vec<Fault>,
    calls: HashMap<StoreOp, usize>,
}

impl State {
    /// Record the call and return the injected fault for it, if any
    fn enter(&mut self, op: StoreOp, targets: &[&str]) -> StoreResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self
            .faults
            .iter()
            .find(|f| f.op == op && (f.target.is_empty() || targets.contains(&f.target.as_str())))
        {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }

    fn bucket(&self, name: &str) -> StoreResult<&BTreeMap<String, StoredObject>> {
        self.containers
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("container {name}")))
    }

    fn bucket_mut(&mut self, name: &str) -> StoreResult<&mut BTreeMap<String, StoredObject>> {
        self.containers
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("container {name}")))
    }
}

/// Object store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds the given containers
    pub fn with_containers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.write();
            for name in names {
                state.containers.entry(name.into()).or_default();
            }
        }
        store
    }

    /// Insert an object directly, bypassing call accounting and faults
    pub fn insert(&self, container: &str, key: &str, data: impl Into<Bytes>) {
        self.write()
            .containers
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject::new(data.into(), None));
    }

    /// Read an object payload directly
    pub fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        self.read()
            .containers
            .get(container)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
    }

    /// Every key currently stored in a container, in order
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.read()
            .containers
            .get(container)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a container exists
    pub fn has_container(&self, container: &str) -> bool {
        self.read().containers.contains_key(container)
    }

    /// Make every `op` touching `target` (a key or container name) fail
    ///
    /// An empty `target` faults every call of `op`.
    pub fn inject_fault(&self, op: StoreOp, target: impl Into<String>, error: StoreError) {
        self.write().faults.push(Fault {
            op,
            target: target.into(),
            error,
        });
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        self.write().faults.clear();
    }

    /// Number of calls made for an operation
    pub fn calls(&self, op: StoreOp) -> usize {
        self.read().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of staged uploads neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.read().uploads.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn etag_for(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>> {
        let mut state = self.write();
        state.enter(StoreOp::ListContainers, &[])?;
        Ok(state.containers.keys().map(ContainerInfo::new).collect())
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut state = self.write();
        state.enter(StoreOp::ListObjects, &[container, prefix])?;
        let bucket = state.bucket(container)?;
        Ok(bucket
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| obj.meta(key))
            .collect())
    }

    async fn head_object(&self, container: &str, key: &str) -> StoreResult<ObjectMeta> {
        let mut state = self.write();
        state.enter(StoreOp::Head, &[container, key])?;
        state
            .bucket(container)?
            .get(key)
            .map(|obj| obj.meta(key))
            .ok_or_else(|| StoreError::NotFound(format!("{container}/{key}")))
    }

    async fn get_object_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream> {
        let mut state = self.write();
        state.enter(StoreOp::Get, &[container, key])?;
        let data = state
            .bucket(container)?
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{container}/{key}")))?;

        let chunks: Vec<StoreResult<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK).min(data.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta> {
        let mut state = self.write();
        state.enter(StoreOp::Put, &[container, key])?;
        let object = StoredObject::new(body, content_type);
        let meta = object.meta(key);
        state.bucket_mut(container)?.insert(key.to_string(), object);
        Ok(meta)
    }

    async fn copy_object(
        &self,
        src_container: &str,
        src_key: &str,
        dst_container: &str,
        dst_key: &str,
    ) -> StoreResult<ObjectMeta> {
        let mut state = self.write();
        state.enter(StoreOp::Copy, &[src_key, dst_key])?;
        let source = state
            .bucket(src_container)?
            .get(src_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{src_container}/{src_key}")))?;
        let copy = StoredObject::new(source.data, source.content_type);
        let meta = copy.meta(dst_key);
        state
            .bucket_mut(dst_container)?
            .insert(dst_key.to_string(), copy);
        Ok(meta)
    }

    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()> {
        let mut state = self.write();
        state.enter(StoreOp::Delete, &[container, key])?;
        state
            .bucket_mut(container)?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{container}/{key}")))
    }

    async fn create_container(&self, name: &str) -> StoreResult<()> {
        let mut state = self.write();
        state.enter(StoreOp::CreateContainer, &[name])?;
        if state.containers.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        state.containers.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> StoreResult<()> {
        let mut state = self.write();
        state.enter(StoreOp::DeleteContainer, &[name])?;
        if !state.bucket(name)?.is_empty() {
            return Err(StoreError::Service(format!("container {name} is not empty")));
        }
        state.containers.remove(name);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        container: &str,
        key: &str,
        content_type: Option<String>,
    ) -> StoreResult<String> {
        let mut state = self.write();
        state.enter(StoreOp::CreateUpload, &[container, key])?;
        state.bucket(container)?;
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                container: container.to_string(),
                key: key.to_string(),
                content_type,
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        let mut state = self.write();
        state.enter(StoreOp::UploadPart, &[container, key])?;
        let etag = etag_for(&body);
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::NotFound(format!("upload {upload_id}")))?;
        upload.parts.insert(part_number, body);
        Ok(CompletedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<ObjectMeta> {
        let mut state = self.write();
        state.enter(StoreOp::CompleteUpload, &[container, key])?;
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StoreError::NotFound(format!("upload {upload_id}")))?;

        let mut data = Vec::new();
        for part in &parts {
            let body = upload.parts.get(&part.part_number).ok_or_else(|| {
                StoreError::Service(format!("part {} was never uploaded", part.part_number))
            })?;
            data.extend_from_slice(body);
        }

        let object = StoredObject::new(Bytes::from(data), upload.content_type);
        let meta = object.meta(&upload.key);
        state
            .bucket_mut(&upload.container)?
            .insert(upload.key, object);
        Ok(meta)
    }

    async fn abort_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.write();
        state.enter(StoreOp::AbortUpload, &[container, key])?;
        state
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("upload {upload_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_list_objects_by_prefix() {
        let store = MemoryStore::with_containers(["releases"]);
        store.insert("releases", "charts/a.tgz", "a");
        store.insert("releases", "charts/b.tgz", "b");
        store.insert("releases", "chartz", "z");

        let listed = store.list_objects("releases", "charts/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["charts/a.tgz", "charts/b.tgz"]);
    }

    #[tokio::test]
    async fn test_stream_round_trips_large_payload() {
        let store = MemoryStore::with_containers(["b1"]);
        let payload = vec![7u8; STREAM_CHUNK * 2 + 10];
        store.insert("b1", "big.bin", payload.clone());

        let chunks: Vec<Bytes> = store
            .get_object_stream("b1", "big.bin")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_copy_preserves_content_type() {
        let store = MemoryStore::with_containers(["b1"]);
        store
            .put_object("b1", "a.json", Bytes::from_static(b"{}"), Some("application/json".into()))
            .await
            .unwrap();
        store.copy_object("b1", "a.json", "b1", "b.json").await.unwrap();

        let meta = store.head_object("b1", "b.json").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let store = MemoryStore::with_containers(["b1"]);
        store.insert("b1", "k1", "x");
        store.inject_fault(StoreOp::Delete, "k1", StoreError::Transport("reset".into()));

        let err = store.delete_object("b1", "k1").await.unwrap_err();
        assert_eq!(err, StoreError::Transport("reset".into()));
        assert_eq!(store.calls(StoreOp::Delete), 1);

        store.clear_faults();
        store.delete_object("b1", "k1").await.unwrap();
        assert!(store.object("b1", "k1").is_none());
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let store = MemoryStore::with_containers(["b1"]);
        let id = store.create_multipart_upload("b1", "big", None).await.unwrap();
        let p1 = store
            .upload_part("b1", "big", &id, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        let p2 = store
            .upload_part("b1", "big", &id, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        assert!(store.object("b1", "big").is_none());

        store
            .complete_multipart_upload("b1", "big", &id, vec![p1, p2])
            .await
            .unwrap();
        assert_eq!(store.object("b1", "big").unwrap(), "hello world");
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_delete_container_requires_empty() {
        let store = MemoryStore::with_containers(["b1"]);
        store.insert("b1", "k1", "x");
        assert!(store.delete_container("b1").await.is_err());
        store.delete_object("b1", "k1").await.unwrap();
        store.delete_container("b1").await.unwrap();
        assert!(!store.has_container("b1"));
    }
}
