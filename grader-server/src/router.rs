//! Routes an incoming chat update to the grading pipeline or to command
//! handling.

use std::sync::Arc;

use grader_core::transcription::extension_for_mime;

use crate::subsystems::commands::{self, parse_command, Command, HELP_TEXT};
use crate::subsystems::notifier::Notifier;
use crate::subsystems::pipeline::{AudioSubmission, Pipeline, PipelineOutcome};
use crate::subsystems::store::GradingStore;
use crate::telegram::{Message, Update};

pub const UNSUPPORTED_MESSAGE: &str =
    "Send a voice message, an audio file, or an audio document.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Audio(AudioSubmission),
    Command { chat_id: i64, command: Command },
    UnknownCommand { chat_id: i64 },
    Unsupported { chat_id: i64 },
}

/// Decide what a message is. Voice, audio, and audio documents are graded;
/// slash commands are handled; everything else gets a hint.
pub fn classify(message: &Message) -> Inbound {
    let chat_id = message.chat.id;
    let message_id = message.message_id;
    let user_id = message.from.as_ref().map(|u| u.id.to_string());

    let audio = if let Some(voice) = &message.voice {
        Some((voice, format!("voice_{}.ogg", message_id)))
    } else if let Some(audio) = &message.audio {
        let name = audio
            .file_name
            .clone()
            .unwrap_or_else(|| format!("audio_{}.mp3", message_id));
        Some((audio, name))
    } else {
        message
            .document
            .as_ref()
            .filter(|d| {
                d.mime_type
                    .as_deref()
                    .map(|m| m.starts_with("audio"))
                    .unwrap_or(false)
            })
            .map(|d| {
                let name = d.file_name.clone().unwrap_or_else(|| {
                    match d.mime_type.as_deref().and_then(extension_for_mime) {
                        Some(ext) => format!("document_{}.{}", message_id, ext),
                        None => format!("document_{}", message_id),
                    }
                });
                (d, name)
            })
    };

    if let Some((file, file_name)) = audio {
        return Inbound::Audio(AudioSubmission {
            chat_id,
            user_id,
            message_id,
            file_ref: file.file_id.clone(),
            file_name,
            mime_type: file.mime_type.clone(),
        });
    }

    match message.text.as_deref().map(str::trim) {
        Some(text) if text.starts_with('/') => match parse_command(text) {
            Some(command) => Inbound::Command { chat_id, command },
            None => Inbound::UnknownCommand { chat_id },
        },
        _ => Inbound::Unsupported { chat_id },
    }
}

pub struct UpdateRouter {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn GradingStore>,
    notifier: Arc<dyn Notifier>,
}

impl UpdateRouter {
    pub fn new(
        pipeline: Arc<Pipeline>,
        store: Arc<dyn GradingStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline,
            store,
            notifier,
        }
    }

    /// Handle one raw webhook update. Never fails; problems are logged and,
    /// where a chat is known, reported to it.
    pub async fn handle_update(&self, update: serde_json::Value) -> Option<PipelineOutcome> {
        let update: Update = match serde_json::from_value(update) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed update");
                return None;
            }
        };
        let update_id = update.update_id;
        let Some(message) = update.into_message() else {
            tracing::debug!(update_id, "No message in update");
            return None;
        };

        match classify(&message) {
            Inbound::Audio(submission) => Some(self.pipeline.run(submission).await),
            Inbound::Command { chat_id, command } => {
                if let Err(e) = commands::handle_command(
                    self.store.as_ref(),
                    self.notifier.as_ref(),
                    chat_id,
                    command,
                )
                .await
                {
                    tracing::error!(chat_id, error = %e, "Command handling failed");
                    self.reply(chat_id, "Could not process the command, try again later.")
                        .await;
                }
                None
            }
            Inbound::UnknownCommand { chat_id } => {
                self.reply(chat_id, HELP_TEXT).await;
                None
            }
            Inbound::Unsupported { chat_id } => {
                self.reply(chat_id, UNSUPPORTED_MESSAGE).await;
                None
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.notifier.notify(chat_id, text).await {
            tracing::warn!(chat_id, error = %e, "Failed to reply");
        }
    }
}
