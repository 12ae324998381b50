use std::path::Path;

use async_trait::async_trait;
use grader_core::GradeError;

use crate::telegram::TelegramClient;

/// Telegram rejects messages above 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub const EMPTY_TRANSCRIPT_MESSAGE: &str = "(empty transcription result)";

/// Delivery of results and failures back to the originating chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), GradeError>;

    /// Deliver a file as an attachment. Notifiers without attachment support
    /// silently skip it.
    async fn send_file(&self, _chat_id: i64, _path: &Path) -> Result<(), GradeError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), GradeError> {
        self.send_message(chat_id, text)
            .await
            .map_err(|e| GradeError::external("telegram", e))
    }

    async fn send_file(&self, chat_id: i64, path: &Path) -> Result<(), GradeError> {
        self.send_document(chat_id, path)
            .await
            .map_err(|e| GradeError::external("telegram", e))
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// Send a possibly long text in chunks; an empty text is sent as a
/// placeholder.
pub async fn notify_long(
    notifier: &dyn Notifier,
    chat_id: i64,
    text: &str,
) -> Result<(), GradeError> {
    if text.is_empty() {
        return notifier.notify(chat_id, EMPTY_TRANSCRIPT_MESSAGE).await;
    }
    for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
        notifier.notify(chat_id, &chunk).await?;
    }
    Ok(())
}
