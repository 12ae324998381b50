use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One graded (or partially graded) attempt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    pub user_id: Option<String>,
    pub chat_id: Option<i64>,
    pub question_id: Option<i64>,
    pub audio_path: Option<String>,
    pub transcript_raw: Option<String>,
    pub transcript_norm: Option<String>,
    /// Reserved for cross-language scoring; never populated by the pipeline.
    pub translated_text: Option<String>,
    pub score: Option<f64>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewSubmission {
    pub user_id: Option<String>,
    pub chat_id: Option<i64>,
    pub question_id: Option<i64>,
    pub audio_path: Option<String>,
    pub transcript_raw: Option<String>,
    pub transcript_norm: Option<String>,
    pub translated_text: Option<String>,
    pub score: Option<f64>,
    pub details: serde_json::Value,
}
