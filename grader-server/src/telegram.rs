//! Telegram Bot API: the subset of update types the grader reads and a thin
//! HTTP client for `getFile`, file download, `sendMessage` and `sendDocument`.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use grader_core::config::{GradeConfig, TelegramConfig};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Update types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

impl Update {
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.edited_message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
    pub document: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// `voice`, `audio` and `document` share the fields the grader needs.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
    download_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, download_timeout: Duration) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            download_timeout,
        })
    }

    pub fn from_config(config: &GradeConfig) -> Result<Self, TelegramError> {
        Self::new(
            &config.telegram,
            Duration::from_secs(config.timeouts.download_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Resolve a file id to its path on the file server, then download it.
    pub async fn download_file(&self, file_id: &str) -> Result<Bytes, TelegramError> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .timeout(self.download_timeout)
            .send()
            .await?;
        let info: ApiResponse<FileInfo> = check_status(response).await?.json().await?;
        if !info.ok {
            return Err(TelegramError::Api(
                info.description.unwrap_or_else(|| "getFile failed".to_string()),
            ));
        }
        let file_path = info
            .result
            .and_then(|r| r.file_path)
            .ok_or_else(|| TelegramError::Api("getFile returned no file_path".to_string()))?;

        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?;
        Ok(check_status(response).await?.bytes().await?)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn send_document(&self, chat_id: i64, path: &Path) -> Result<(), TelegramError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript.txt".to_string());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TelegramError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TelegramError::Status {
        code: status.as_u16(),
        message,
    })
}
