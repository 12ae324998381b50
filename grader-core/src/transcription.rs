//! Speech-to-text client.
//!
//! `TranscriptionBackend` abstracts the external capability;
//! `WhisperClient` talks to an OpenAI-compatible
//! `POST {base_url}/audio/transcriptions` endpoint with a multipart body
//! (`model`, optional `language`, `file`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::GradeConfig;

/// A locally stored audio file and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub mime_type: String,
}

impl AudioArtifact {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build an artifact, guessing the MIME type from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = guess_mime_type(&path).to_string();
        Self { path, mime_type }
    }

    /// Prefer the MIME type the chat platform reported for the upload; fall
    /// back to the extension when it is missing or not an audio type.
    pub fn with_declared_mime(path: impl Into<PathBuf>, declared: Option<&str>) -> Self {
        match declared.map(str::trim).filter(|m| m.starts_with("audio/")) {
            Some(mime) => Self::new(path, mime),
            None => Self::from_path(path),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string())
    }
}

pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "ogg" | "oga" | "opus" => "audio/ogg",
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// File extension for an audio MIME type, ignoring parameters such as
/// `codecs=opus`.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base.to_ascii_lowercase().as_str() {
        "audio/ogg" | "audio/opus" => Some("ogg"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/webm" => Some("webm"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Best-effort transcript; the empty string when the service returned no
    /// recognizable text field.
    async fn transcribe(
        &self,
        audio: &AudioArtifact,
        language: Option<&str>,
    ) -> Result<String, TranscriptionError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Cannot read audio file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl TranscriptionError {
    /// Rate limits, server errors and transport failures may succeed on
    /// another attempt; a rejected file or key will not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl From<&GradeConfig> for TranscriptionConfig {
    fn from(config: &GradeConfig) -> Self {
        Self {
            api_key: config.openai.api_key.clone(),
            base_url: config.openai.base_url.clone(),
            model: config.openai.transcription_model.clone(),
            timeout: Duration::from_secs(config.timeouts.transcription_secs),
            max_retries: config.retry.max_retries,
            retry_delay_ms: config.retry.retry_delay_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WhisperClient {
    client: Client,
    config: TranscriptionConfig,
}

impl WhisperClient {
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscriptionError> {
        if config.api_key.is_empty() {
            return Err(TranscriptionError::MissingApiKey);
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn transcribe_once(
        &self,
        bytes: &[u8],
        audio: &AudioArtifact,
        language: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        let part = Part::bytes(bytes.to_vec())
            .file_name(audio.file_name())
            .mime_str(&audio.mime_type)?;

        let mut form = Form::new().text("model", self.config.model.clone());
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }
        let form = form.part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(code = status.as_u16(), message = %message, "Transcription API error");
            return Err(TranscriptionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text.or(body.transcript).unwrap_or_default())
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperClient {
    async fn transcribe(
        &self,
        audio: &AudioArtifact,
        language: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(|source| TranscriptionError::Read {
                path: audio.path.display().to_string(),
                source,
            })?;

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);
        let attempts = self.config.max_retries + 1;

        let result = RetryIf::spawn(
            retry_strategy,
            || self.transcribe_once(&bytes, audio, language),
            TranscriptionError::is_transient,
        )
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) if !e.is_transient() => {
                tracing::error!(
                    file = %audio.path.display(),
                    error = %e,
                    "Transcription rejected, not retrying"
                );
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    attempts = attempts,
                    file = %audio.path.display(),
                    error = %e,
                    "All transcription attempts failed"
                );
                Err(TranscriptionError::RetryExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "whisper"
    }
}
