//! S3 store implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bkd-core.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CreateBucketConfiguration,
};
use bytes::Bytes;
use futures::StreamExt;

use bkd_core::{
    ByteStream, CompletedPart, ContainerInfo, DriveProfile, ObjectMeta, ObjectStore, Result,
    StoreError, StoreResult,
};

/// Region S3 treats as the default location (no location constraint)
const DEFAULT_REGION: &str = "us-east-1";

/// Object store backed by an S3-compatible endpoint
pub struct S3Store {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Create a new store from a drive profile
    pub async fn new(profile: &DriveProfile) -> Result<Self> {
        profile.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None,
            None,
            "bkd-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(&profile.endpoint)
            .load()
            .await;

        // Path-style addressing unless DNS lookup is requested explicitly
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.bucket_lookup != "dns")
            .build();

        tracing::debug!(
            drive = %profile.name,
            endpoint = %profile.endpoint,
            region = %profile.region,
            "created S3 store"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            region: profile.region.clone(),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map an S3 error code onto the store error kinds
fn classify_code(code: &str, target: String, message: String) -> StoreError {
    match code {
        "NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound" => StoreError::NotFound(target),
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => StoreError::AlreadyExists(target),
        "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
        | "Forbidden" => StoreError::Auth(message),
        _ => StoreError::Service(message),
    }
}

fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, target: impl Into<String>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let target = target.into();
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let code = match (context.err().code(), status) {
                (Some(code), _) => code,
                (None, 404) => "NotFound",
                (None, 403) => "AccessDenied",
                (None, _) => "",
            };
            classify_code(code, target, message)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transport(message)
        }
        _ => StoreError::Service(message),
    }
}

fn timestamp(value: Option<&aws_smithy_types::DateTime>) -> Option<jiff::Timestamp> {
    value.and_then(|t| jiff::Timestamp::from_second(t.secs()).ok())
}

fn etag(value: Option<&str>) -> String {
    value.unwrap_or_default().trim_matches('"').to_string()
}

fn size(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "buckets"))?;

        Ok(response
            .buckets()
            .iter()
            .map(|b| ContainerInfo {
                name: b.name().unwrap_or_default().to_string(),
                created: timestamp(b.creation_date()),
            })
            .collect())
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.inner.list_objects_v2().bucket(container);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| map_sdk_error(e, format!("{container}/{prefix}")))?;

            for object in response.contents() {
                objects.push(ObjectMeta {
                    key: object.key().unwrap_or_default().to_string(),
                    size: size(object.size()),
                    etag: etag(object.e_tag()),
                    content_type: None,
                    last_modified: timestamp(object.last_modified()),
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(container, prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    async fn head_object(&self, container: &str, key: &str) -> StoreResult<ObjectMeta> {
        let response = self
            .inner
            .head_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: size(response.content_length()),
            etag: etag(response.e_tag()),
            content_type: response.content_type().map(str::to_string),
            last_modified: timestamp(response.last_modified()),
        })
    }

    async fn get_object_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream> {
        let response = self
            .inner
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        let stream = futures::stream::unfold(response.body, |mut body| async move {
            match body.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), body)),
                Some(Err(e)) => Some((Err(StoreError::Transport(e.to_string())), body)),
                None => None,
            }
        });
        Ok(stream.boxed())
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<ObjectMeta> {
        let size = body.len() as u64;
        let mut request = self
            .inner
            .put_object()
            .bucket(container)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(body));

        if let Some(ct) = &content_type {
            request = request.content_type(ct);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        tracing::debug!(container, key, size, "put object");
        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            etag: etag(response.e_tag()),
            content_type,
            last_modified: Some(jiff::Timestamp::now()),
        })
    }

    async fn copy_object(
        &self,
        src_container: &str,
        src_key: &str,
        dst_container: &str,
        dst_key: &str,
    ) -> StoreResult<ObjectMeta> {
        let copy_source = format!("{src_container}/{src_key}");

        let response = self
            .inner
            .copy_object()
            .copy_source(&copy_source)
            .bucket(dst_container)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, copy_source.clone()))?;

        // Copy responses carry no size, fetch it from the new object
        let mut meta = self.head_object(dst_container, dst_key).await?;
        if let Some(tag) = response.copy_object_result().and_then(|r| r.e_tag()) {
            meta.etag = etag(Some(tag));
        }

        tracing::debug!(from = %copy_source, dst_container, dst_key, "copied object");
        Ok(meta)
    }

    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()> {
        self.inner
            .delete_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        tracing::debug!(container, key, "deleted object");
        Ok(())
    }

    async fn create_container(&self, name: &str) -> StoreResult<()> {
        let mut request = self.inner.create_bucket().bucket(name);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(|e| map_sdk_error(e, name))?;
        tracing::debug!(bucket = name, "created bucket");
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> StoreResult<()> {
        self.inner
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, name))?;

        tracing::debug!(bucket = name, "deleted bucket");
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        container: &str,
        key: &str,
        content_type: Option<String>,
    ) -> StoreResult<String> {
        let mut request = self
            .inner
            .create_multipart_upload()
            .bucket(container)
            .key(key);
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::Service("create multipart upload returned no upload id".into()))
    }

    async fn upload_part(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        let response = self
            .inner
            .upload_part()
            .bucket(container)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        Ok(CompletedPart {
            part_number,
            etag: etag(response.e_tag()),
        })
    }

    async fn complete_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<ObjectMeta> {
        let parts = parts
            .into_iter()
            .map(|p| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();

        self.inner
            .complete_multipart_upload()
            .bucket(container)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        self.head_object(container, key).await
    }

    async fn abort_multipart_upload(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(container)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, format!("{container}/{key}")))?;

        tracing::debug!(container, key, upload_id, "aborted multipart upload");
        Ok(())
    }
}
