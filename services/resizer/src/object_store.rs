use crate::config::{S3Config, UploadConfig};
use crate::error::StorageError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl, StorageClass};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

/// An object read from the store
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// A derivative to write
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Object store used for source reads and derivative writes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Write an object; repeating the same request is harmless
    async fn put_object(&self, request: UploadRequest) -> Result<(), StorageError>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
    source_bucket: String,
    upload_bucket: String,
    upload: UploadConfig,
    multipart_threshold: usize,
    part_size: usize,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(s3: &S3Config, upload: &UploadConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(s3.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = s3.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if s3.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let store = Self::with_client(S3Client::from_conf(s3_config_builder.build()), s3, upload);

        info!(
            source_bucket = %store.source_bucket,
            upload_bucket = %store.upload_bucket,
            region = %s3.region,
            "S3 object store initialized"
        );

        store
    }

    /// Wrap an already configured client
    pub fn with_client(client: S3Client, s3: &S3Config, upload: &UploadConfig) -> Self {
        let upload_bucket = upload.bucket.clone().unwrap_or_else(|| s3.bucket.clone());

        Self {
            client,
            source_bucket: s3.bucket.clone(),
            upload_bucket,
            upload: upload.clone(),
            multipart_threshold: s3.multipart_threshold_bytes,
            part_size: s3.part_size_bytes,
        }
    }

    /// Simple single-part upload for small files
    async fn simple_upload(&self, request: &UploadRequest) -> Result<(), StorageError> {
        let mut put = self
            .client
            .put_object()
            .bucket(&self.upload_bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body.clone()))
            .content_type(&request.content_type)
            .set_metadata(self.metadata());

        if let Some(ref acl) = self.upload.acl {
            put = put.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(ref cache_control) = self.upload.cache_control {
            put = put.cache_control(cache_control);
        }
        if let Some(ref storage_class) = self.upload.storage_class {
            put = put.storage_class(StorageClass::from(storage_class.as_str()));
        }

        put.send()
            .await
            .map_err(|e| transient(&request.key, "put object", e))?;

        Ok(())
    }

    /// Multipart upload for large files
    async fn multipart_upload(&self, request: &UploadRequest) -> Result<(), StorageError> {
        let mut create = self
            .client
            .create_multipart_upload()
            .bucket(&self.upload_bucket)
            .key(&request.key)
            .content_type(&request.content_type)
            .set_metadata(self.metadata());

        if let Some(ref acl) = self.upload.acl {
            create = create.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(ref cache_control) = self.upload.cache_control {
            create = create.cache_control(cache_control);
        }
        if let Some(ref storage_class) = self.upload.storage_class {
            create = create.storage_class(StorageClass::from(storage_class.as_str()));
        }

        let create_response = create
            .send()
            .await
            .map_err(|e| transient(&request.key, "create multipart upload", e))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| StorageError::Transient("no upload ID in response".to_string()))?;

        match self.upload_parts(request, upload_id).await {
            Ok(parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(&self.upload_bucket)
                    .key(&request.key)
                    .upload_id(upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| transient(&request.key, "complete multipart upload", e))?;

                Ok(())
            }
            Err(e) => {
                // Leave no orphaned parts behind
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.upload_bucket)
                    .key(&request.key)
                    .upload_id(upload_id)
                    .send()
                    .await
                {
                    warn!(key = %request.key, error = %abort_err, "Failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        request: &UploadRequest,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut completed_parts = Vec::new();

        for (index, chunk) in request.body.chunks(self.part_size).enumerate() {
            let part_number = index as i32 + 1;

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.upload_bucket)
                .key(&request.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(request.body.slice_ref(chunk)))
                .send()
                .await
                .map_err(|e| transient(&request.key, "upload part", e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );
        }

        Ok(completed_parts)
    }

    fn metadata(&self) -> Option<std::collections::HashMap<String, String>> {
        if self.upload.metadata.is_empty() {
            None
        } else {
            Some(self.upload.metadata.clone())
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.source_bucket))]
    async fn get_object(&self, key: &str) -> Result<StoredObject, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.source_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(key, e))?;

        let content_type = output.content_type().map(String::from);
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Transient(format!("failed to read body of {key}: {e}")))?
            .into_bytes();

        debug!(key = %key, size_bytes = body.len(), "Fetched source object");

        Ok(StoredObject { body, content_type })
    }

    #[instrument(skip(self, request), fields(bucket = %self.upload_bucket, key = %request.key))]
    async fn put_object(&self, request: UploadRequest) -> Result<(), StorageError> {
        if request.body.len() > self.multipart_threshold {
            self.multipart_upload(&request).await?;
        } else {
            self.simple_upload(&request).await?;
        }

        debug!(
            key = %request.key,
            size_bytes = request.body.len(),
            content_type = %request.content_type,
            "Uploaded derivative"
        );

        Ok(())
    }
}

fn classify_get_error<R>(key: &str, err: SdkError<GetObjectError, R>) -> StorageError
where
    R: std::fmt::Debug,
{
    if let Some(service_err) = err.as_service_error() {
        if service_err.is_no_such_key() {
            return StorageError::NotFound {
                key: key.to_string(),
            };
        }
        if service_err.code() == Some("AccessDenied") {
            return StorageError::AccessDenied {
                key: key.to_string(),
            };
        }
    }

    StorageError::Transient(format!("failed to get {key}: {err:?}"))
}

fn transient<E, R>(key: &str, operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: std::fmt::Debug,
    R: std::fmt::Debug,
{
    StorageError::Transient(format!("failed to {operation} for {key}: {err:?}"))
}
