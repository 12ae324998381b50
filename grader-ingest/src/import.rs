//! Bulk import of questions and historical answers.
//!
//! Malformed rows are skipped with a `Validation` error recorded in the
//! report; any other error aborts the import.

use std::collections::HashMap;

use async_trait::async_trait;
use grader_core::models::{Discipline, NewQuestion, NewSubmission, Question};
use grader_core::GradeError;
use serde::Serialize;
use sqlx::PgPool;

use crate::headers::{resolve, AnswerField, QuestionField, ANSWER_ALIASES, QUESTION_ALIASES};
use crate::source::Sheet;

pub const DEFAULT_DISCIPLINE_TITLE: &str = "Imported";
pub const ANSWERS_IMPORT_SOURCE: &str = "answers_sheet";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// One line per skipped row: `row <n>: <reason>` (1-based, header excluded).
    pub errors: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, row: usize, error: GradeError) {
        tracing::warn!(row, error = %error, "Skipping row");
        self.skipped += 1;
        self.errors.push(format!("row {}: {}", row, error));
    }
}

/// Changes applied to an existing question; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionUpdate {
    pub prompt_text: Option<String>,
    pub ideal_text: Option<String>,
    pub required_keywords: Option<String>,
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Find a discipline by title or create it; returns its id.
    async fn ensure_discipline(&self, title: &str, description: &str) -> Result<i64, GradeError>;

    async fn find_question_by_code(
        &self,
        discipline_id: i64,
        code: &str,
    ) -> Result<Option<Question>, GradeError>;

    async fn find_question_by_prompt(
        &self,
        discipline_id: i64,
        prompt: &str,
    ) -> Result<Option<Question>, GradeError>;

    async fn create_question(&self, question: &NewQuestion) -> Result<i64, GradeError>;

    async fn update_question(&self, id: i64, update: &QuestionUpdate) -> Result<(), GradeError>;

    async fn insert_submission(&self, submission: &NewSubmission) -> Result<i64, GradeError>;
}

// ============================================================================
// Questions sheet
// ============================================================================

pub async fn import_questions(
    store: &dyn ImportStore,
    sheet: &Sheet,
    default_discipline: &str,
) -> Result<ImportReport, GradeError> {
    let columns = resolve(&sheet.headers, QUESTION_ALIASES);
    tracing::info!(rows = sheet.rows.len(), columns = ?columns, "Importing questions");

    let mut report = ImportReport::default();
    let mut disciplines: HashMap<String, i64> = HashMap::new();

    for (index, record) in sheet.records().enumerate() {
        let row = index + 1;
        let field = |f: QuestionField| {
            columns
                .get(&f)
                .and_then(|h| record.get(h.as_str()))
                .map(|v| v.to_string())
        };
        let key = field(QuestionField::Key);
        let prompt = field(QuestionField::Prompt);
        let ideal = field(QuestionField::Ideal);
        let keywords = field(QuestionField::Keywords);
        let title = field(QuestionField::Discipline)
            .unwrap_or_else(|| default_discipline.to_string());

        let discipline_id = match disciplines.get(&title) {
            Some(id) => *id,
            None => {
                let id = store
                    .ensure_discipline(&title, "Imported from questions sheet")
                    .await?;
                disciplines.insert(title.clone(), id);
                id
            }
        };

        let mut existing = None;
        if let Some(code) = &key {
            existing = store.find_question_by_code(discipline_id, code).await?;
        }
        if existing.is_none() {
            if let Some(p) = &prompt {
                existing = store.find_question_by_prompt(discipline_id, p).await?;
            }
        }

        match existing {
            Some(q) => {
                let update = QuestionUpdate {
                    prompt_text: prompt,
                    ideal_text: ideal,
                    required_keywords: keywords,
                };
                store.update_question(q.id, &update).await?;
                tracing::debug!(row, question_id = q.id, "Updated question");
                report.updated += 1;
            }
            None => {
                let new = match NewQuestion::new(discipline_id, prompt.unwrap_or_default()) {
                    Ok(q) => q.with_code(key).with_ideal(ideal).with_keywords(keywords),
                    Err(e) => {
                        report.skip(row, e);
                        continue;
                    }
                };
                let id = store.create_question(&new).await?;
                tracing::debug!(row, question_id = id, "Created question");
                report.created += 1;
            }
        }
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "Questions import finished"
    );
    Ok(report)
}

// ============================================================================
// Answers sheet
// ============================================================================

/// Parse a grade cell. Blank is no grade; a decimal comma is accepted.
pub fn parse_grade(raw: Option<&str>) -> Result<Option<f64>, GradeError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|g| g.is_finite())
        .map(Some)
        .ok_or_else(|| GradeError::Validation(format!("grade {:?} is not a number", raw)))
}

pub async fn import_answers(
    store: &dyn ImportStore,
    sheet: &Sheet,
    default_discipline: &str,
) -> Result<ImportReport, GradeError> {
    let columns = resolve(&sheet.headers, ANSWER_ALIASES);
    tracing::info!(rows = sheet.rows.len(), columns = ?columns, "Importing answers");

    let mut report = ImportReport::default();
    let mut disciplines: HashMap<String, i64> = HashMap::new();

    for (index, record) in sheet.records().enumerate() {
        let row = index + 1;
        let field = |f: AnswerField| {
            columns
                .get(&f)
                .and_then(|h| record.get(h.as_str()))
                .map(|v| v.to_string())
        };

        let score = match parse_grade(field(AnswerField::Grade).as_deref()) {
            Ok(s) => s,
            Err(e) => {
                report.skip(row, e);
                continue;
            }
        };
        let title =
            field(AnswerField::Discipline).unwrap_or_else(|| default_discipline.to_string());
        let discipline_id = match disciplines.get(&title) {
            Some(id) => *id,
            None => {
                let id = store
                    .ensure_discipline(&title, "Imported from answers sheet")
                    .await?;
                disciplines.insert(title.clone(), id);
                id
            }
        };

        let question_id = match field(AnswerField::Ticket) {
            Some(ticket) => store
                .find_question_by_code(discipline_id, &ticket)
                .await?
                .map(|q| q.id),
            None => None,
        };

        let mut details = serde_json::json!({ "import_source": ANSWERS_IMPORT_SOURCE });
        if let Some(name) = field(AnswerField::StudentName) {
            details["student_name"] = serde_json::Value::String(name);
        }

        let submission = NewSubmission {
            user_id: field(AnswerField::StudentId),
            question_id,
            transcript_raw: field(AnswerField::Answer),
            score,
            details,
            ..NewSubmission::default()
        };
        let id = store.insert_submission(&submission).await?;
        tracing::debug!(row, submission_id = id, "Imported answer");
        report.created += 1;
    }

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        "Answers import finished"
    );
    Ok(report)
}

// ============================================================================
// PostgreSQL store
// ============================================================================

pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const QUESTION_COLUMNS: &str = "id, discipline_id, code, prompt_text, ideal_text, \
     required_keywords, metadata, created_at";

#[async_trait]
impl ImportStore for PgImportStore {
    async fn ensure_discipline(&self, title: &str, description: &str) -> Result<i64, GradeError> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM disciplines WHERE title = $1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        if let Some((id,)) = found {
            return Ok(id);
        }

        // A concurrent importer may insert the same code first.
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO disciplines (code, title, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
            RETURNING id
            "#,
        )
        .bind(Discipline::code_for_title(title))
        .bind(title)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(discipline_id = id, title, "Discipline ready");
        Ok(id)
    }

    async fn find_question_by_code(
        &self,
        discipline_id: i64,
        code: &str,
    ) -> Result<Option<Question>, GradeError> {
        let sql = format!(
            "SELECT {} FROM questions WHERE discipline_id = $1 AND code = $2 ORDER BY id LIMIT 1",
            QUESTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Question>(&sql)
            .bind(discipline_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_question_by_prompt(
        &self,
        discipline_id: i64,
        prompt: &str,
    ) -> Result<Option<Question>, GradeError> {
        let sql = format!(
            "SELECT {} FROM questions WHERE discipline_id = $1 AND prompt_text = $2 \
             ORDER BY id LIMIT 1",
            QUESTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Question>(&sql)
            .bind(discipline_id)
            .bind(prompt)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_question(&self, q: &NewQuestion) -> Result<i64, GradeError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO questions (discipline_id, code, prompt_text, ideal_text, required_keywords)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(q.discipline_id)
        .bind(&q.code)
        .bind(&q.prompt_text)
        .bind(&q.ideal_text)
        .bind(&q.required_keywords)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_question(&self, id: i64, u: &QuestionUpdate) -> Result<(), GradeError> {
        sqlx::query(
            r#"
            UPDATE questions
            SET prompt_text = COALESCE($2, prompt_text),
                ideal_text = COALESCE($3, ideal_text),
                required_keywords = COALESCE($4, required_keywords)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&u.prompt_text)
        .bind(&u.ideal_text)
        .bind(&u.required_keywords)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_submission(&self, s: &NewSubmission) -> Result<i64, GradeError> {
        let (id,): (i64,) = sqlx::query_as(
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
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade(None).unwrap(), None);
        assert_eq!(parse_grade(Some("  ")).unwrap(), None);
        assert_eq!(parse_grade(Some("5")).unwrap(), Some(5.0));
        assert_eq!(parse_grade(Some("4,5")).unwrap(), Some(4.5));
        assert!(matches!(
            parse_grade(Some("отлично")),
            Err(GradeError::Validation(_))
        ));
        assert!(parse_grade(Some("NaN")).is_err());
    }
}
