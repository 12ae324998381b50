//! Shared in-memory doubles for the grading pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use grader_core::models::{ChatSetting, Discipline, NewSubmission, Question};
use grader_core::{
    EmbeddingConfig, GradeError, OpenAiEmbeddingClient, TranscriptionConfig, WhisperClient,
};
use grader_server::subsystems::audio_source::AudioSource;
use grader_server::subsystems::notifier::Notifier;
use grader_server::subsystems::pipeline::{Pipeline, PipelineSettings};
use grader_server::subsystems::storage::ArtifactStore;
use grader_server::subsystems::store::GradingStore;
use tempfile::TempDir;
use wiremock::MockServer;

#[derive(Default)]
pub struct InMemoryStore {
    pub questions: Mutex<Vec<Question>>,
    pub disciplines: Mutex<Vec<Discipline>>,
    pub settings: Mutex<HashMap<i64, ChatSetting>>,
    pub submissions: Mutex<Vec<NewSubmission>>,
}

impl InMemoryStore {
    pub fn with_question(question: Question, chat_id: i64) -> Self {
        let store = Self::default();
        store.settings.lock().unwrap().insert(
            chat_id,
            ChatSetting {
                chat_id,
                discipline_id: Some(question.discipline_id),
                question_id: Some(question.id),
                updated_at: Utc::now(),
            },
        );
        store.questions.lock().unwrap().push(question);
        store
    }

    pub fn submissions(&self) -> Vec<NewSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl GradingStore for InMemoryStore {
    async fn health(&self) -> Result<String, GradeError> {
        Ok("in-memory".to_string())
    }

    async fn target_question(&self, chat_id: i64) -> Result<Option<Question>, GradeError> {
        let question_id = self
            .settings
            .lock()
            .unwrap()
            .get(&chat_id)
            .and_then(|s| s.question_id);
        Ok(question_id.and_then(|id| {
            self.questions
                .lock()
                .unwrap()
                .iter()
                .find(|q| q.id == id)
                .cloned()
        }))
    }

    async fn insert_submission(&self, submission: &NewSubmission) -> Result<i64, GradeError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(submission.clone());
        Ok(submissions.len() as i64)
    }

    async fn list_disciplines(&self) -> Result<Vec<Discipline>, GradeError> {
        Ok(self.disciplines.lock().unwrap().clone())
    }

    async fn chat_setting(&self, chat_id: i64) -> Result<Option<ChatSetting>, GradeError> {
        Ok(self.settings.lock().unwrap().get(&chat_id).cloned())
    }

    async fn set_chat_discipline(
        &self,
        chat_id: i64,
        discipline_id: i64,
    ) -> Result<Option<Discipline>, GradeError> {
        let found = self
            .disciplines
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == discipline_id)
            .cloned();
        if found.is_some() {
            self.settings.lock().unwrap().insert(
                chat_id,
                ChatSetting {
                    chat_id,
                    discipline_id: Some(discipline_id),
                    question_id: None,
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(found)
    }

    async fn set_chat_question(
        &self,
        chat_id: i64,
        question_id: i64,
    ) -> Result<Option<Question>, GradeError> {
        let found = self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|q| q.id == question_id)
            .cloned();
        if let Some(q) = &found {
            self.settings.lock().unwrap().insert(
                chat_id,
                ChatSetting {
                    chat_id,
                    discipline_id: Some(q.discipline_id),
                    question_id: Some(q.id),
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(found)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(i64, String)>>,
    pub files: Mutex<Vec<(i64, PathBuf)>>,
}

impl RecordingNotifier {
    pub fn texts(&self, chat_id: i64) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == chat_id)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), GradeError> {
        self.messages
            .lock()
            .unwrap()
            .push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_file(&self, chat_id: i64, path: &Path) -> Result<(), GradeError> {
        self.files
            .lock()
            .unwrap()
            .push((chat_id, path.to_path_buf()));
        Ok(())
    }
}

/// Serves fixed bytes for any reference; `None` simulates a download failure.
pub struct FakeAudioSource(pub Option<Vec<u8>>);

#[async_trait]
impl AudioSource for FakeAudioSource {
    async fn fetch(&self, file_ref: &str) -> Result<Bytes, GradeError> {
        match &self.0 {
            Some(bytes) => Ok(Bytes::from(bytes.clone())),
            None => Err(GradeError::external(
                "audio-fetch",
                format!("no such file {}", file_ref),
            )),
        }
    }
}

pub fn question(id: i64, ideal: Option<&str>, keywords: Option<&str>) -> Question {
    Question {
        id,
        discipline_id: 1,
        code: Some(format!("q{}", id)),
        prompt_text: "Что такое митоз?".to_string(),
        ideal_text: ideal.map(str::to_string),
        required_keywords: keywords.map(str::to_string),
        metadata: serde_json::json!({}),
        created_at: Utc::now(),
    }
}

pub fn whisper_client(server: &MockServer) -> WhisperClient {
    WhisperClient::new(TranscriptionConfig {
        api_key: "sk-test".to_string(),
        base_url: server.uri(),
        model: "whisper-1".to_string(),
        timeout: Duration::from_secs(5),
        max_retries: 0,
        retry_delay_ms: 1,
    })
    .unwrap()
}

pub fn embedding_client(server: &MockServer) -> OpenAiEmbeddingClient {
    OpenAiEmbeddingClient::new(EmbeddingConfig {
        api_key: "sk-test".to_string(),
        base_url: server.uri(),
        model: "text-embedding-3-small".to_string(),
        dimensions: None,
        timeout: Duration::from_secs(5),
        max_retries: 0,
        retry_delay_ms: 1,
    })
    .unwrap()
}

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

/// A pipeline wired to an OpenAI-compatible mock server.
pub fn harness(server: &MockServer, store: InMemoryStore, audio: Option<Vec<u8>>) -> Harness {
    let settings = PipelineSettings {
        download_timeout: Duration::from_secs(5),
        transcription_timeout: Duration::from_secs(5),
        scoring_timeout: Duration::from_secs(5),
        ..PipelineSettings::default()
    };
    harness_with_settings(server, store, audio, settings)
}

pub fn harness_with_settings(
    server: &MockServer,
    store: InMemoryStore,
    audio: Option<Vec<u8>>,
    settings: PipelineSettings,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(FakeAudioSource(audio)),
        Arc::new(whisper_client(server)),
        Arc::new(embedding_client(server)),
        store.clone(),
        notifier.clone(),
        ArtifactStore::new(dir.path().join("uploads"), dir.path().join("transcripts")),
        settings,
    ));
    Harness {
        pipeline,
        store,
        notifier,
        dir,
    }
}
