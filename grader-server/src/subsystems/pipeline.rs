//! Submission grading pipeline.
//!
//! RECEIVED → DOWNLOADED → TRANSCRIBED → NORMALIZED → SCORED (optional) → PERSISTED
//!
//! Any stage up to and including transcription is fatal for the submission:
//! nothing is persisted and the user gets a failure notice. Scoring is best
//! effort: when it fails the submission is still persisted, unscored.
//! Errors never escape [`Pipeline::run`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use grader_core::config::GradeConfig;
use grader_core::models::{NewSubmission, Question};
use grader_core::{
    fuse, normalize, AudioArtifact, EmbeddingBackend, GradeError, ScoreBreakdown, ScoreWeights,
    TranscriptionBackend,
};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::subsystems::audio_source::AudioSource;
use crate::subsystems::notifier::{notify_long, Notifier};
use crate::subsystems::storage::ArtifactStore;
use crate::subsystems::store::GradingStore;

pub const FAILURE_MESSAGE: &str = "An error occurred while processing the audio.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Downloaded,
    Transcribed,
    Normalized,
    Scored,
    Persisted,
}

impl Stage {
    /// The action that moves a submission into this stage.
    pub fn action(&self) -> &'static str {
        match self {
            Stage::Received => "receive",
            Stage::Downloaded => "download",
            Stage::Transcribed => "transcribe",
            Stage::Normalized => "normalize",
            Stage::Scored => "score",
            Stage::Persisted => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// A stage failure; `stage` is the stage that was being entered.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: GradeError,
}

impl StageError {
    fn new(stage: Stage, source: impl Into<GradeError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// An audio answer received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSubmission {
    pub chat_id: i64,
    pub user_id: Option<String>,
    pub message_id: i64,
    pub file_ref: String,
    pub file_name: String,
    /// MIME type reported by the chat platform, if any.
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Persisted {
        submission_id: i64,
        score: Option<f64>,
        transcript_norm: String,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub weights: ScoreWeights,
    pub language: Option<String>,
    pub download_timeout: Duration,
    pub transcription_timeout: Duration,
    pub scoring_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            language: None,
            download_timeout: Duration::from_secs(30),
            transcription_timeout: Duration::from_secs(300),
            scoring_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&GradeConfig> for PipelineSettings {
    /// Stage budgets cover every retry attempt of the underlying client.
    fn from(config: &GradeConfig) -> Self {
        let attempts = config.retry.max_retries as u64 + 1;
        let backoff = Duration::from_secs(10) * attempts as u32;
        Self {
            weights: config.scoring,
            language: config.openai.language.clone(),
            download_timeout: Duration::from_secs(config.timeouts.download_secs),
            transcription_timeout: Duration::from_secs(config.timeouts.transcription_secs * attempts)
                + backoff,
            scoring_timeout: Duration::from_secs(config.timeouts.embedding_secs * attempts)
                + backoff,
        }
    }
}

impl PipelineSettings {
    /// Upper bound on one run: every stage that can block is bounded.
    pub fn run_budget(&self) -> Duration {
        self.download_timeout + self.transcription_timeout + self.scoring_timeout
    }
}

enum Scoring {
    NoTarget,
    Scored(ScoreBreakdown),
    Failed(String),
}

pub struct Pipeline {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn TranscriptionBackend>,
    embedder: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn GradingStore>,
    notifier: Arc<dyn Notifier>,
    artifacts: ArtifactStore,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn TranscriptionBackend>,
        embedder: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn GradingStore>,
        notifier: Arc<dyn Notifier>,
        artifacts: ArtifactStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            transcriber,
            embedder,
            store,
            notifier,
            artifacts,
            settings,
        }
    }

    /// Run one submission to completion or failure.
    pub async fn run(&self, submission: AudioSubmission) -> PipelineOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "submission",
            %run_id,
            chat_id = submission.chat_id,
            message_id = submission.message_id
        );

        async {
            tracing::info!(file_ref = %submission.file_ref, "Submission received");
            match self.process(run_id, &submission).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(stage = %e.stage, error = %e.source, "Pipeline stage failed");
                    self.notify_best_effort(submission.chat_id, FAILURE_MESSAGE).await;
                    PipelineOutcome::Failed {
                        stage: e.stage,
                        error: e.source.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        run_id: Uuid,
        submission: &AudioSubmission,
    ) -> Result<PipelineOutcome, StageError> {
        // RECEIVED → DOWNLOADED
        let bytes = bounded(
            Stage::Downloaded,
            self.settings.download_timeout,
            self.source.fetch(&submission.file_ref),
        )
        .await?;
        let name = ArtifactStore::artifact_name(
            submission.chat_id,
            submission.message_id,
            &submission.file_name,
        );
        let audio_path = self
            .artifacts
            .save_audio(&name, &bytes)
            .await
            .map_err(|e| StageError::new(Stage::Downloaded, e))?;
        tracing::info!(path = %audio_path.display(), bytes = bytes.len(), "Saved uploaded audio");

        // DOWNLOADED → TRANSCRIBED
        let audio =
            AudioArtifact::with_declared_mime(&audio_path, submission.mime_type.as_deref());
        let language = self.settings.language.as_deref();
        let transcript_raw = bounded(
            Stage::Transcribed,
            self.settings.transcription_timeout,
            async {
                self.transcriber
                    .transcribe(&audio, language)
                    .await
                    .map_err(GradeError::from)
            },
        )
        .await?;
        tracing::info!(chars = transcript_raw.chars().count(), "Transcription finished");

        // TRANSCRIBED → NORMALIZED
        let transcript_norm = normalize(&transcript_raw);
        let transcript_path = match self
            .artifacts
            .save_transcript(&audio_path, &transcript_norm)
            .await
        {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write transcript artifact");
                None
            }
        };

        if let Err(e) =
            notify_long(self.notifier.as_ref(), submission.chat_id, &transcript_norm).await
        {
            tracing::warn!(error = %e, "Failed to deliver transcript");
        }
        if let Some(path) = &transcript_path {
            if let Err(e) = self.notifier.send_file(submission.chat_id, path).await {
                tracing::warn!(error = %e, "Failed to deliver transcript file");
            }
        }

        // NORMALIZED → SCORED
        let question = self.resolve_target(submission.chat_id).await;
        let scoring = match &question {
            Some(q) => self.score(q, &transcript_raw).await,
            None => Scoring::NoTarget,
        };

        // → PERSISTED
        let (score, details) = self.details(run_id, &scoring);
        let record = NewSubmission {
            user_id: submission.user_id.clone(),
            chat_id: Some(submission.chat_id),
            question_id: question.as_ref().map(|q| q.id),
            audio_path: Some(audio_path.display().to_string()),
            transcript_raw: Some(transcript_raw),
            transcript_norm: Some(transcript_norm.clone()),
            translated_text: None,
            score,
            details,
        };
        let submission_id = self
            .store
            .insert_submission(&record)
            .await
            .map_err(|e| StageError::new(Stage::Persisted, e))?;
        tracing::info!(submission_id, score = ?score, "Submission persisted");

        if let Scoring::Scored(b) = &scoring {
            let summary = format!(
                "Score: {:.2} (semantic {:.2}, keywords {:.2})",
                b.final_score, b.sem_sim, b.key_score
            );
            self.notify_best_effort(submission.chat_id, &summary).await;
        }

        Ok(PipelineOutcome::Persisted {
            submission_id,
            score,
            transcript_norm,
        })
    }

    /// The chat's selected question, when it has a reference answer. Lookup
    /// failures leave the submission unscored.
    async fn resolve_target(&self, chat_id: i64) -> Option<Question> {
        match self.store.target_question(chat_id).await {
            Ok(Some(q)) if q.ideal_answer().is_some() => Some(q),
            Ok(Some(q)) => {
                tracing::info!(question_id = q.id, "Selected question has no reference answer");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Target question lookup failed, skipping scoring");
                None
            }
        }
    }

    async fn score(&self, question: &Question, transcript_raw: &str) -> Scoring {
        let ideal = question.ideal_answer().unwrap_or_default();
        let keywords = question.keywords();
        let result = bounded(Stage::Scored, self.settings.scoring_timeout, async {
            fuse(
                self.embedder.as_ref(),
                transcript_raw,
                ideal,
                &keywords,
                &self.settings.weights,
            )
            .await
            .map_err(GradeError::from)
        })
        .await;

        match result {
            Ok(breakdown) => {
                tracing::info!(
                    question_id = question.id,
                    final_score = breakdown.final_score,
                    "Submission scored"
                );
                Scoring::Scored(breakdown)
            }
            Err(e) => {
                tracing::error!(
                    question_id = question.id,
                    stage = %e.stage,
                    error = %e.source,
                    "Scoring failed, persisting unscored"
                );
                Scoring::Failed(e.source.to_string())
            }
        }
    }

    fn details(&self, run_id: Uuid, scoring: &Scoring) -> (Option<f64>, serde_json::Value) {
        let mut details = serde_json::json!({
            "source": "pipeline",
            "run_id": run_id,
        });
        let score = match scoring {
            Scoring::NoTarget => None,
            Scoring::Scored(b) => {
                details["breakdown"] = serde_json::json!(b);
                details["weights"] = serde_json::json!(self.settings.weights);
                details["embedding_backend"] = serde_json::json!(self.embedder.name());
                Some(b.final_score)
            }
            Scoring::Failed(err) => {
                details["scoring_error"] = serde_json::json!(err);
                None
            }
        };
        (score, details)
    }

    async fn notify_best_effort(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.notifier.notify(chat_id, text).await {
            tracing::warn!(chat_id, error = %e, "Failed to notify user");
        }
    }
}

/// Run a stage future under a time budget; exceeding it is an external
/// service failure at that stage.
async fn bounded<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, GradeError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => {
            tracing::debug!(stage = %stage, "Stage complete");
            Ok(value)
        }
        Ok(Err(e)) => Err(StageError::new(stage, e)),
        Err(_) => Err(StageError::new(
            stage,
            GradeError::external(
                stage.action(),
                format!("timed out after {}ms", limit.as_millis()),
            ),
        )),
    }
}
