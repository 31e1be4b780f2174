use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::errors::AppError;

/// Plain-text blob storage, keyed by string. One object per resume.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_text(&self, key: &str, body: String) -> Result<(), AppError>;
    async fn get_text(&self, key: &str) -> Result<String, AppError>;
}

/// S3 (MinIO-compatible) blob store.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_text(&self, key: &str, body: String) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.into_bytes()))
            .content_type("text/plain; charset=utf-8")
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 put {key} failed: {e}")))?;
        Ok(())
    }

    async fn get_text(&self, key: &str) -> Result<String, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 get {key} failed: {e}")))?;
        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 read {key} failed: {e}")))?
            .into_bytes();
        String::from_utf8(bytes.to_vec())
            .map_err(|e| AppError::Storage(format!("Blob {key} is not valid UTF-8: {e}")))
    }
}
