//! Content sessions
//!
//! [`ContentWriter`] buffers a leaf payload locally and commits it exactly once
//! on [`ContentWriter::close`]; [`ContentReader`] streams a leaf payload forward
//! from the store. Both keep the drive's session count raised while alive, so
//! the drive cannot be unmounted under them.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;

use crate::drive::{DriveConnection, SessionGuard};
use crate::error::{Error, Result};
use crate::nav::{self, EntryKind};
use crate::path::ParsedPath;
use crate::traits::{ByteStream, CompletedPart, ObjectMeta, ObjectStore};
use crate::transfer::{TransferConfig, calculate_parts, part_byte_range};

/// Open a write session on a leaf
///
/// The leaf does not need to exist; an existing leaf is replaced on close.
/// Container paths and directories are rejected with [`Error::Unsupported`].
pub async fn open_writer(drive: &DriveConnection, raw: &str) -> Result<ContentWriter> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root || path.is_container_only() {
        return Err(Error::Unsupported(format!(
            "cannot write content to container '{raw}'"
        )));
    }
    path.validate_names()?;
    if !nav::container_exists(drive, &path.container).await? {
        return Err(Error::NotFound(format!("container {}", path.container)));
    }
    if nav::classify(drive, &path).await? == Some(EntryKind::SyntheticContainer) {
        return Err(Error::Unsupported(format!(
            "cannot write content to directory '{}'",
            path.display()
        )));
    }

    tracing::debug!(path = %path, "opened writer");
    Ok(ContentWriter {
        store: drive.store_handle(),
        transfer: *drive.transfer(),
        path,
        buffer: Vec::new(),
        content_type: None,
        finished: false,
        _session: drive.open_session(),
    })
}

/// Open a read session on a leaf
pub async fn open_reader(drive: &DriveConnection, raw: &str) -> Result<ContentReader> {
    let path = drive.resolve(raw)?;
    if path.is_drive_root || path.is_container_only() {
        return Err(Error::Unsupported(format!(
            "cannot read content of container '{raw}'"
        )));
    }
    let meta = nav::leaf_meta(drive, &path)
        .await?
        .ok_or_else(|| Error::NotFound(path.display()))?;
    let stream = drive
        .store()
        .get_object_stream(&path.container, &path.key())
        .await
        .map_err(|e| Error::from_store("get", path.display(), e))?;

    Ok(ContentReader {
        path,
        meta,
        stream: Some(stream),
        position: 0,
        _session: drive.open_session(),
    })
}

/// Buffered write session for one leaf
///
/// Bytes are collected through [`std::io::Write`]. Nothing reaches the store
/// until [`close`](Self::close); [`abort`](Self::abort) or dropping the writer
/// discards the buffer. Concurrent writers to the same key are not
/// coordinated: the last commit wins.
pub struct ContentWriter {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    path: ParsedPath,
    buffer: Vec<u8>,
    content_type: Option<String>,
    finished: bool,
    _session: SessionGuard,
}

impl std::fmt::Debug for ContentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentWriter")
            .field("path", &self.path.display())
            .field("buffered", &self.buffer.len())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl ContentWriter {
    /// Content type recorded with the committed object
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn path(&self) -> &ParsedPath {
        &self.path
    }

    /// Number of bytes buffered so far
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Commit the buffered payload
    ///
    /// Payloads below the drive's multipart threshold go out as one put, larger
    /// ones as a staged upload which is aborted store-side if any step fails.
    pub async fn close(mut self) -> Result<ObjectMeta> {
        self.finished = true;
        let body = Bytes::from(std::mem::take(&mut self.buffer));
        let size = body.len() as u64;

        let meta = if self.transfer.use_multipart(size) {
            self.commit_staged(body).await?
        } else {
            self.store
                .put_object(
                    &self.path.container,
                    &self.path.key(),
                    body,
                    self.content_type.clone(),
                )
                .await
                .map_err(|e| Error::io("put", self.path.display(), e))?
        };

        tracing::debug!(path = %self.path, size, "committed writer");
        Ok(meta)
    }

    /// Discard the buffered payload without touching the store
    pub fn abort(mut self) {
        self.finished = true;
        tracing::debug!(
            path = %self.path,
            discarded = self.buffer.len(),
            "aborted writer"
        );
    }

    async fn commit_staged(&self, body: Bytes) -> Result<ObjectMeta> {
        let key = self.path.key();
        let upload_id = self
            .store
            .create_multipart_upload(&self.path.container, &key, self.content_type.clone())
            .await
            .map_err(|e| Error::io("create upload", self.path.display(), e))?;

        match self.upload_parts(&key, &upload_id, body).await {
            Ok(meta) => Ok(meta),
            Err(e) => {
                if let Err(abort_err) = self
                    .store
                    .abort_multipart_upload(&self.path.container, &key, &upload_id)
                    .await
                {
                    tracing::warn!(
                        path = %self.path,
                        upload_id,
                        error = %abort_err,
                        "failed to abort staged upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(&self, key: &str, upload_id: &str, body: Bytes) -> Result<ObjectMeta> {
        let total = body.len() as u64;
        let part_size = self.transfer.calculate_part_size(total);
        let part_count = calculate_parts(total, part_size);
        let mut parts: Vec<CompletedPart> = Vec::with_capacity(part_count);

        for index in 1..=part_count {
            let part_number = index as i32;
            let (start, end) = part_byte_range(part_number, part_size, total);
            let chunk = body.slice(start as usize..end as usize);
            tracing::debug!(path = %self.path, part_number, size = chunk.len(), "uploading part");
            let part = self
                .store
                .upload_part(&self.path.container, key, upload_id, part_number, chunk)
                .await
                .map_err(|e| Error::io("upload part", self.path.display(), e))?;
            parts.push(part);
        }

        self.store
            .complete_multipart_upload(&self.path.container, key, upload_id, parts)
            .await
            .map_err(|e| Error::io("complete upload", self.path.display(), e))
    }
}

impl io::Write for ContentWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ContentWriter {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                path = %self.path,
                discarded = self.buffer.len(),
                "writer dropped without close, content discarded"
            );
        }
    }
}

/// Forward-only read session for one leaf
pub struct ContentReader {
    path: ParsedPath,
    meta: ObjectMeta,
    stream: Option<ByteStream>,
    position: u64,
    _session: SessionGuard,
}

impl std::fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentReader")
            .field("path", &self.path.display())
            .field("len", &self.meta.size)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl ContentReader {
    pub fn path(&self) -> &ParsedPath {
        &self.path
    }

    /// Payload length taken from the object metadata
    pub fn len(&self) -> u64 {
        self.meta.size
    }

    pub fn is_empty(&self) -> bool {
        self.meta.size == 0
    }

    pub fn content_type(&self) -> Option<&str> {
        self.meta.content_type.as_deref()
    }

    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Next payload chunk, `None` once the payload is exhausted
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(chunk)) => {
                self.position += chunk.len() as u64;
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.stream = None;
                Err(Error::io("get", self.path.display(), e))
            }
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    /// Consume the rest of the payload
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let remaining = self.meta.size.saturating_sub(self.position) as usize;
        let mut data = Vec::with_capacity(remaining);
        while let Some(chunk) = self.next_chunk().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(data))
    }

    /// End the session, dropping any unread payload
    pub fn close(self) {
        tracing::debug!(path = %self.path, read = self.position, "closed reader");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::drive::MountOptions;
    use crate::error::StoreError;
    use crate::memory::{MemoryStore, StoreOp};
    use crate::transfer::MIN_PART_SIZE;

    fn seeded() -> Arc<MemoryStore> {
        let store = MemoryStore::with_containers(["releases"]);
        store.insert("releases", "charts/a.tgz", "chart-a");
        Arc::new(store)
    }

    async fn mounted(store: &Arc<MemoryStore>, transfer: TransferConfig) -> DriveConnection {
        DriveConnection::mount(MountOptions::new("").transfer(transfer), Arc::<MemoryStore>::clone(store))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_writer_commits_single_put() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;
        let mut writer = open_writer(&drive, "releases/notes.txt")
            .await
            .unwrap()
            .with_content_type("text/plain");
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(drive.open_sessions(), 1);

        let meta = writer.close().await.unwrap();
        assert_eq!(meta.size, 11);
        assert_eq!(store.object("releases", "notes.txt").unwrap(), "hello world");
        assert_eq!(store.calls(StoreOp::Put), 1);
        assert_eq!(drive.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_writer_stages_large_payload() {
        let store = seeded();
        let transfer = TransferConfig::new()
            .multipart_threshold(1024)
            .part_size(MIN_PART_SIZE);
        let drive = mounted(&store, transfer).await;
        let payload = vec![3u8; MIN_PART_SIZE as usize * 2 + 7];

        let mut writer = open_writer(&drive, "releases/big.bin").await.unwrap();
        writer.write_all(&payload).unwrap();
        writer.close().await.unwrap();

        assert_eq!(store.calls(StoreOp::UploadPart), 3);
        assert_eq!(store.calls(StoreOp::Put), 0);
        assert_eq!(store.object("releases", "big.bin").unwrap(), payload);
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_writer_with_zero_part_size_from_config() {
        let store = seeded();
        let transfer: TransferConfig =
            toml::from_str("multipart_threshold = 1024\npart_size = 0").unwrap();
        let drive = mounted(&store, transfer).await;
        let payload = vec![5u8; 6 * 1024 * 1024];

        let mut writer = open_writer(&drive, "releases/six.bin").await.unwrap();
        writer.write_all(&payload).unwrap();
        writer.close().await.unwrap();

        assert_eq!(store.calls(StoreOp::UploadPart), 2);
        assert_eq!(store.object("releases", "six.bin").unwrap(), payload);
    }

    #[tokio::test]
    async fn test_failed_staged_upload_is_aborted() {
        let store = seeded();
        store.inject_fault(
            StoreOp::UploadPart,
            "big.bin",
            StoreError::Transport("reset".into()),
        );
        let drive = mounted(&store, TransferConfig::new().multipart_threshold(4)).await;

        let mut writer = open_writer(&drive, "releases/big.bin").await.unwrap();
        writer.write_all(b"0123456789").unwrap();
        let err = writer.close().await.unwrap_err();

        assert!(matches!(err, Error::Io { operation: "upload part", .. }));
        assert_eq!(store.calls(StoreOp::AbortUpload), 1);
        assert_eq!(store.pending_uploads(), 0);
        assert!(store.object("releases", "big.bin").is_none());
    }

    #[tokio::test]
    async fn test_abort_and_drop_commit_nothing() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;

        let mut writer = open_writer(&drive, "releases/a.txt").await.unwrap();
        writer.write_all(b"discard me").unwrap();
        writer.abort();

        let mut writer = open_writer(&drive, "releases/b.txt").await.unwrap();
        writer.write_all(b"discard me too").unwrap();
        drop(writer);

        assert_eq!(store.calls(StoreOp::Put), 0);
        assert_eq!(drive.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_open_writer_rejects_containers() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;
        for target in ["releases", "releases/charts", "/"] {
            let err = open_writer(&drive, target).await.unwrap_err();
            assert!(matches!(err, Error::Unsupported(_)), "{target}: {err}");
        }
    }

    #[tokio::test]
    async fn test_unmount_busy_while_writer_open() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;
        let writer = open_writer(&drive, "releases/c.txt").await.unwrap();

        let err = drive.unmount().unwrap_err();
        assert_eq!(err.open_sessions, 1);

        writer.close().await.unwrap();
        err.drive.unmount().unwrap();
    }

    #[tokio::test]
    async fn test_reader_streams_payload() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;
        let mut reader = open_reader(&drive, "releases/charts/a.tgz").await.unwrap();
        assert_eq!(reader.len(), 7);

        let data = reader.read_to_end().await.unwrap();
        assert_eq!(data, "chart-a");
        assert_eq!(reader.position(), 7);
        assert!(reader.next_chunk().await.unwrap().is_none());
        reader.close();
        assert_eq!(drive.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_open_reader_missing_leaf() {
        let store = seeded();
        let drive = mounted(&store, TransferConfig::default()).await;
        let err = open_reader(&drive, "releases/missing.tgz").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
