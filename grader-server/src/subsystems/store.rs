//! Persistence for the live grading path: question lookup for a chat, chat
//! settings, and the single-row submission insert.

use async_trait::async_trait;
use grader_core::models::{ChatSetting, Discipline, NewSubmission, Question};
use grader_core::GradeError;
use sqlx::PgPool;

#[async_trait]
pub trait GradingStore: Send + Sync {
    /// Backend identification for health reporting.
    async fn health(&self) -> Result<String, GradeError>;

    /// The question currently selected for a chat, if any.
    async fn target_question(&self, chat_id: i64) -> Result<Option<Question>, GradeError>;

    async fn insert_submission(&self, submission: &NewSubmission) -> Result<i64, GradeError>;

    async fn list_disciplines(&self) -> Result<Vec<Discipline>, GradeError>;

    async fn chat_setting(&self, chat_id: i64) -> Result<Option<ChatSetting>, GradeError>;

    /// Select a discipline for a chat and clear its selected question.
    /// Returns `None` when the discipline does not exist.
    async fn set_chat_discipline(
        &self,
        chat_id: i64,
        discipline_id: i64,
    ) -> Result<Option<Discipline>, GradeError>;

    /// Select a question (and its discipline) for a chat.
    /// Returns `None` when the question does not exist.
    async fn set_chat_question(
        &self,
        chat_id: i64,
        question_id: i64,
    ) -> Result<Option<Question>, GradeError>;
}

#[derive(Debug, Clone)]
pub struct PgGradingStore {
    pool: PgPool,
}

impl PgGradingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const QUESTION_COLUMNS: &str = "q.id, q.discipline_id, q.code, q.prompt_text, q.ideal_text, \
     q.required_keywords, q.metadata, q.created_at";

#[async_trait]
impl GradingStore for PgGradingStore {
    async fn health(&self) -> Result<String, GradeError> {
        Ok(grader_core::db::health_check(&self.pool).await?)
    }

    async fn target_question(&self, chat_id: i64) -> Result<Option<Question>, GradeError> {
        let sql = format!(
            "SELECT {} FROM chat_settings cs JOIN questions q ON q.id = cs.question_id \
             WHERE cs.chat_id = $1",
            QUESTION_COLUMNS
        );
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(question)
    }

    async fn insert_submission(&self, s: &NewSubmission) -> Result<i64, GradeError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO submissions
                (user_id, chat_id, question_id, audio_path, transcript_raw,
                 transcript_norm, translated_text, score, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&s.user_id)
        .bind(s.chat_id)
        .bind(s.question_id)
        .bind(&s.audio_path)
        .bind(&s.transcript_raw)
        .bind(&s.transcript_norm)
        .bind(&s.translated_text)
        .bind(s.score)
        .bind(&s.details)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn list_disciplines(&self) -> Result<Vec<Discipline>, GradeError> {
        let rows = sqlx::query_as::<_, Discipline>(
            "SELECT id, code, title, description, created_at FROM disciplines ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn chat_setting(&self, chat_id: i64) -> Result<Option<ChatSetting>, GradeError> {
        let row = sqlx::query_as::<_, ChatSetting>(
            "SELECT chat_id, discipline_id, question_id, updated_at FROM chat_settings \
             WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_chat_discipline(
        &self,
        chat_id: i64,
        discipline_id: i64,
    ) -> Result<Option<Discipline>, GradeError> {
        let mut tx = self.pool.begin().await?;

        let discipline = sqlx::query_as::<_, Discipline>(
            "SELECT id, code, title, description, created_at FROM disciplines WHERE id = $1",
        )
        .bind(discipline_id)
        .fetch_optional(&mut *tx)
        .await?;

        if discipline.is_some() {
            sqlx::query(
                r#"
                INSERT INTO chat_settings (chat_id, discipline_id, question_id, updated_at)
                VALUES ($1, $2, NULL, now())
                ON CONFLICT (chat_id) DO UPDATE
                SET discipline_id = EXCLUDED.discipline_id,
                    question_id = NULL,
                    updated_at = now()
                "#,
            )
            .bind(chat_id)
            .bind(discipline_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(discipline)
    }

    async fn set_chat_question(
        &self,
        chat_id: i64,
        question_id: i64,
    ) -> Result<Option<Question>, GradeError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM questions q WHERE q.id = $1", QUESTION_COLUMNS);
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(question_id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(q) = &question {
            sqlx::query(
                r#"
                INSERT INTO chat_settings (chat_id, discipline_id, question_id, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (chat_id) DO UPDATE
                SET discipline_id = EXCLUDED.discipline_id,
                    question_id = EXCLUDED.question_id,
                    updated_at = now()
                "#,
            )
            .bind(chat_id)
            .bind(q.discipline_id)
            .bind(q.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(question)
    }
}
