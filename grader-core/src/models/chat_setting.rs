use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-chat selection of the discipline and the question being answered.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSetting {
    pub chat_id: i64,
    pub discipline_id: Option<i64>,
    pub question_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}
