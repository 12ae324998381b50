use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Discipline {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Discipline {
    /// Code derived from a title: lowercase, spaces to `_`, at most 50 chars.
    pub fn code_for_title(title: &str) -> String {
        title
            .trim()
            .to_lowercase()
            .replace(' ', "_")
            .chars()
            .take(50)
            .collect()
    }
}
