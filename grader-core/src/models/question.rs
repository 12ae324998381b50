use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GradeError;
use crate::keywords::parse_keywords;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub discipline_id: i64,
    pub code: Option<String>,
    pub prompt_text: String,
    pub ideal_text: Option<String>,
    /// Comma separated or JSON array string.
    pub required_keywords: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// The reference answer, if one is set and non-blank.
    pub fn ideal_answer(&self) -> Option<&str> {
        self.ideal_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn keywords(&self) -> Vec<String> {
        self.required_keywords
            .as_deref()
            .map(parse_keywords)
            .unwrap_or_default()
    }
}

/// A question about to be inserted. `prompt_text` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub discipline_id: i64,
    pub code: Option<String>,
    pub prompt_text: String,
    pub ideal_text: Option<String>,
    pub required_keywords: Option<String>,
}

impl NewQuestion {
    pub fn new(discipline_id: i64, prompt_text: impl Into<String>) -> Result<Self, GradeError> {
        let prompt_text = prompt_text.into().trim().to_string();
        if prompt_text.is_empty() {
            return Err(GradeError::Validation(
                "question prompt_text must not be empty".to_string(),
            ));
        }
        Ok(Self {
            discipline_id,
            code: None,
            prompt_text,
            ideal_text: None,
            required_keywords: None,
        })
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_ideal(mut self, ideal_text: Option<String>) -> Self {
        self.ideal_text = ideal_text;
        self
    }

    pub fn with_keywords(mut self, keywords: Option<String>) -> Self {
        self.required_keywords = keywords;
        self
    }
}
