use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::optimizer::extract::FileType;

/// Prefix under which all of a user's uploads live.
pub fn user_prefix(user_id: &str) -> String {
    format!("user_{user_id}/")
}

/// Object key for a freshly uploaded resume file.
pub fn object_key(user_id: &str, file_id: Uuid, file_type: FileType) -> String {
    format!("{}{file_id}.{}", user_prefix(user_id), file_type.extension())
}

/// Resume file storage. `S3Store` in production.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `body` under `key` and returns the object's URL.
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, AppError>;

    async fn download(&self, key: &str) -> Result<Bytes, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Total bytes stored under the user's prefix.
    async fn usage(&self, user_id: &str) -> Result<u64, AppError>;
}

/// S3-compatible bucket (MinIO locally).
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
    endpoint: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Path-style URL of an object.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, AppError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::S3(format!("Failed to upload {key}: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{key}", self.bucket);
        Ok(self.object_url(key))
    }

    async fn download(&self, key: &str) -> Result<Bytes, AppError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::NotFound(format!("File {key} not found: {e}")))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::S3(format!("Failed to read {key}: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("Failed to delete {key}: {e}")))?;

        info!("Deleted s3://{}/{key}", self.bucket);
        Ok(())
    }

    async fn usage(&self, user_id: &str) -> Result<u64, AppError> {
        let prefix = user_prefix(user_id);
        let mut total: u64 = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| AppError::S3(format!("Failed to list {prefix}: {e}")))?;

            total += page
                .contents()
                .iter()
                .filter_map(|obj| obj.size())
                .map(|size| size.max(0) as u64)
                .sum::<u64>();

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("User {user_id} storage usage: {total} bytes");
        Ok(total)
    }
}
