use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::transcription::TranscriptionError;

#[derive(Error, Debug)]
pub enum GradeError {
    /// A required credential or identifier is missing at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transcription, embedding, or audio fetch failed or timed out.
    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    /// A malformed input record (bulk import path).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GradeError {
    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalService { .. })
    }
}

impl From<EmbeddingError> for GradeError {
    fn from(e: EmbeddingError) -> Self {
        Self::external("embedding", e)
    }
}

impl From<TranscriptionError> for GradeError {
    fn from(e: TranscriptionError) -> Self {
        Self::external("transcription", e)
    }
}
