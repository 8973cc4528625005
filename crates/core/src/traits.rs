//! ObjectStore trait definition
//!
//! This trait is the contract the engine consumes from an object-store client.
//! It only knows flat containers and keys: no directories, no rename and no
//! multi-object transactions. Everything hierarchical is synthesized on top of
//! it by the navigation and CRUD engines.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result type for raw store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Sequential stream of payload chunks returned by [`ObjectStore::get_object_stream`]
pub type ByteStream = BoxStream<'static, StoreResult<Bytes>>;

/// A container (bucket) as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container name
    pub name: String,

    /// Creation timestamp, when the store reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<jiff::Timestamp>,
}

impl ContainerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: None,
        }
    }
}

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Full object key inside its container
    pub key: String,

    /// Payload size in bytes
    pub size: u64,

    /// ETag (quotes stripped)
    pub etag: String,

    /// Content type recorded at upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
}

impl ObjectMeta {
    pub fn new(key: impl Into<String>, size: u64, etag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size,
            etag: etag.into(),
            content_type: None,
            last_modified: None,
        }
    }
}

/// A part acknowledged by the store during a staged upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Trait for flat object-store operations
///
/// Implemented by the S3 adapter and by [`MemoryStore`](crate::memory::MemoryStore);
/// mocked in unit tests. Every call is a single request/response: implementations
/// must not retry on their own, transient failures surface to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every container visible to the credentials
    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>>;

    /// List every object in `container` whose key starts with `prefix`
    ///
    /// The listing is flat (no delimiter) and fully paginated.
    async fn list_objects(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>>;

    /// Fetch object metadata, failing with [`StoreError::NotFound`] when absent
    async fn head_object(&self, container: &str, key: &str) -> StoreResult<ObjectMeta>;

    /// Open a sequential byte stream over the object payload
    async fn get_object_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream>;

    /// Store `body` under `key`, replacing any previous object (last write wins)
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta>;

    /// Server-side copy, preserving payload and content type
    async fn copy_object(
        &self,
        src_container: &str,
        src_key: &str,
        dst_container: &str,
        dst_key: &str,
    ) -> StoreResult<ObjectMeta>;

    /// Delete a single object
    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()>;

    /// Create a container
    async fn create_container(&self, name: &str) -> StoreResult<()>;

    /// Delete an empty container
    async fn delete_container(&self, name: &str) -> StoreResult<()>;

    /// Start a staged upload and return its upload id
    async fn create_multipart_upload(
        &self,
        container: &str,
        key: &str,
        content_type: Option<String>,
    ) -> StoreResult<String>;

    /// Upload one part of a staged upload
    async fn upload_part(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart>;

    /// Commit a staged upload; the object becomes visible atomically
    async fn complete_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<ObjectMeta>;

    /// Discard a staged upload and every part uploaded so far
    async fn abort_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;
}
