//! Embedding backend for the semantic similarity signal.
//!
//! Provides an `EmbeddingBackend` trait and an OpenAI-compatible HTTP
//! implementation (`POST {base_url}/embeddings` with `{model, input}`).
//! Failures are never absorbed here: the caller decides what an unscored
//! submission looks like.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::GradeConfig;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl EmbeddingError {
    /// Only rate limits, 5xx and transport failures are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: Option<usize>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl From<&GradeConfig> for EmbeddingConfig {
    fn from(config: &GradeConfig) -> Self {
        Self {
            api_key: config.openai.api_key.clone(),
            base_url: config.openai.base_url.clone(),
            model: config.openai.embedding_model.clone(),
            dimensions: config.openai.embedding_dimensions,
            timeout: Duration::from_secs(config.timeouts.embedding_secs),
            max_retries: config.retry.max_retries,
            retry_delay_ms: config.retry.retry_delay_ms,
        }
    }
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiEmbeddingClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    /// Generate an embedding, retrying with jittered exponential backoff.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let attempts = self.config.max_retries + 1;

        let result = RetryIf::spawn(
            retry_strategy,
            || self.embed_once(text),
            EmbeddingError::is_transient,
        )
        .await;

        match result {
            Ok(vec) => Ok(vec),
            Err(e) if !e.is_transient() => {
                tracing::error!(model = %self.config.model, error = %e, "Embedding request rejected");
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    attempts = attempts,
                    model = %self.config.model,
                    error = %e,
                    "All embedding attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::warn!(code = status.as_u16(), message = %message, "Embedding API error");

            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;

        let values = body
            .data
            .into_iter()
            .next()
            .and_then(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if let Some(expected) = self.config.dimensions {
            if values.len() != expected {
                return Err(EmbeddingError::InvalidDimensions {
                    expected,
                    actual: values.len(),
                });
            }
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_raw(text).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str, base_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: api_key.to_string(),
            base_url,
            model: "text-embedding-3-small".to_string(),
            dimensions: Some(8),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    fn mock_embedding_response(dims: usize) -> serde_json::Value {
        let values: Vec<f32> = (0..dims).map(|i| (i as f32 + 1.0) / dims as f32).collect();
        serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": values }],
            "model": "text-embedding-3-small"
        })
    }

    #[tokio::test]
    async fn test_embed_calls_api_with_model_and_input() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri()))
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "hello world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(8)))
            .mount(&mock_server)
            .await;

        let embedding = client.embed("hello world").await.expect("embedding");
        assert_eq!(embedding.len(), 8);
        assert_eq!(client.name(), "openai");
    }

    #[tokio::test]
    async fn test_embed_returns_retry_exhausted_on_500() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "Internal server error" }
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.embed("hello").await {
            Err(EmbeddingError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("Internal server error"), "last = {}", last);
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_bad_request_is_not_retried() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Invalid input" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.embed("hello").await {
            Err(EmbeddingError::Api { code, .. }) => assert_eq!(code, 400),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(8)))
            .mount(&mock_server)
            .await;

        let embedding = client.embed("hello").await.expect("success after retry");
        assert_eq!(embedding.len(), 8);
    }

    #[tokio::test]
    async fn test_missing_api_key_rejected() {
        let result = OpenAiEmbeddingClient::new(test_config("", "http://localhost".to_string()));
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": []
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed_once("hello").await;
        assert!(matches!(result, Err(EmbeddingError::MissingEmbedding)));
        assert!(client.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_dimensions_is_an_error() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(3)))
            .mount(&mock_server)
            .await;

        match client.embed_once("hello").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions, got {:?}", other),
        }
    }
}
