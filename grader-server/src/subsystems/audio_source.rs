use async_trait::async_trait;
use bytes::Bytes;
use grader_core::GradeError;

use crate::telegram::TelegramClient;

/// Fetches the bytes behind an opaque audio file reference.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, GradeError>;
}

#[async_trait]
impl AudioSource for TelegramClient {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, GradeError> {
        self.download_file(file_ref)
            .await
            .map_err(|e| GradeError::external("audio-fetch", e))
    }
}
