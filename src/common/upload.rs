use crate::infrastructure::storage::s3::StorageService;
use crate::modules::video::error::PipelineError;
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tracing::error;

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

/// Result of a completed source upload: the stored key plus the byte count
/// and content hash computed while streaming (no second pass over the data).
#[derive(Debug, Clone)]
pub struct UploadedSource {
    pub key: String,
    pub size_bytes: u64,
    /// sha-256, hex-encoded. Used for the content-addressed layout and dedup.
    pub content_hash: String,
}

pub struct MultipartUploader<'a> {
    storage: &'a StorageService,
    key: String,
    upload_id: String,
    parts: Vec<aws_sdk_s3::types::CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
}

impl<'a> MultipartUploader<'a> {
    pub async fn new(
        storage: &'a StorageService,
        key: String,
        content_type: &str,
    ) -> Result<Self, PipelineError> {
        let upload_id = storage
            .create_multipart_upload(&key, content_type)
            .await
            .map_err(|e| PipelineError::storage_io(format!("failed to initiate upload: {e}")))?;

        Ok(Self {
            storage,
            key,
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(&chunk);

        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }

        Ok(())
    }

    async fn flush_part(&mut self) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let body = Bytes::from(std::mem::take(&mut self.buffer));
        self.buffer.reserve(MIN_PART_SIZE);

        let part = self
            .storage
            .upload_part(&self.key, &self.upload_id, self.part_number, body)
            .await
            .map_err(|e| {
                PipelineError::storage_io(format!(
                    "failed to upload part {}: {e}",
                    self.part_number
                ))
            })?;

        self.parts.push(part);
        self.part_number += 1;

        Ok(())
    }

    pub async fn finish(mut self) -> Result<(), PipelineError> {
        // Upload remaining buffer as last part
        if !self.buffer.is_empty() {
            self.flush_part().await?;
        }

        self.storage
            .complete_multipart_upload(&self.key, &self.upload_id, self.parts)
            .await
            .map_err(|e| PipelineError::storage_io(format!("failed to complete upload: {e}")))?;

        Ok(())
    }

    pub async fn abort(&self) {
        if let Err(e) = self
            .storage
            .abort_multipart_upload(&self.key, &self.upload_id)
            .await
        {
            error!("Failed to abort multipart upload {}: {}", self.key, e);
        }
    }
}

/// Streams one multipart field into the object store, hashing as it goes
/// and aborting the upload the moment the size limit is crossed. The caller
/// validates the content type before we get here.
pub async fn stream_to_s3(
    storage: &StorageService,
    mut field: Field<'_>,
    key: String,
    content_type: &str,
    max_bytes: u64,
) -> Result<UploadedSource, PipelineError> {
    let mut uploader = MultipartUploader::new(storage, key.clone(), content_type).await?;
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                uploader.abort().await;
                return Err(PipelineError::storage_io(format!("upload stream interrupted: {e}")));
            }
        };

        total += chunk.len() as u64;
        if total > max_bytes {
            uploader.abort().await;
            return Err(PipelineError::TooLarge { limit: max_bytes });
        }

        hasher.update(&chunk);
        if let Err(e) = uploader.write_chunk(chunk).await {
            error!("Upload error: {}", e);
            uploader.abort().await;
            return Err(e);
        }
    }

    uploader.finish().await?;

    Ok(UploadedSource {
        key,
        size_bytes: total,
        content_hash: hex::encode(hasher.finalize()),
    })
}
