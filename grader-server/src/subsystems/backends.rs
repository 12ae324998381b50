//! Construction of the external-capability clients from configuration.

use std::sync::Arc;

use grader_core::{
    EmbeddingBackend, EmbeddingConfig, GradeConfig, GradeError, OpenAiEmbeddingClient,
    TranscriptionBackend, TranscriptionConfig, WhisperClient,
};

pub fn create_embedding_backend(
    config: &GradeConfig,
) -> Result<Arc<dyn EmbeddingBackend>, GradeError> {
    let client = OpenAiEmbeddingClient::new(EmbeddingConfig::from(config))
        .map_err(|e| GradeError::Configuration(format!("embedding client: {}", e)))?;
    Ok(Arc::new(client))
}

pub fn create_transcription_backend(
    config: &GradeConfig,
) -> Result<Arc<dyn TranscriptionBackend>, GradeError> {
    let client = WhisperClient::new(TranscriptionConfig::from(config))
        .map_err(|e| GradeError::Configuration(format!("transcription client: {}", e)))?;
    Ok(Arc::new(client))
}
