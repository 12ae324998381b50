//! Import tests against an in-memory store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use grader_core::models::{Discipline, NewQuestion, NewSubmission, Question};
use grader_core::GradeError;
use grader_ingest::import::QuestionUpdate;
use grader_ingest::{import_answers, import_questions, ImportStore, Sheet};
use serde_json::json;

#[derive(Default)]
struct MemoryStore {
    disciplines: Mutex<Vec<Discipline>>,
    questions: Mutex<Vec<Question>>,
    submissions: Mutex<Vec<NewSubmission>>,
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn ensure_discipline(&self, title: &str, description: &str) -> Result<i64, GradeError> {
        let mut disciplines = self.disciplines.lock().unwrap();
        if let Some(d) = disciplines.iter().find(|d| d.title == title) {
            return Ok(d.id);
        }
        let id = disciplines.len() as i64 + 1;
        disciplines.push(Discipline {
            id,
            code: Discipline::code_for_title(title),
            title: title.to_string(),
            description: Some(description.to_string()),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_question_by_code(
        &self,
        discipline_id: i64,
        code: &str,
    ) -> Result<Option<Question>, GradeError> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|q| q.discipline_id == discipline_id && q.code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_question_by_prompt(
        &self,
        discipline_id: i64,
        prompt: &str,
    ) -> Result<Option<Question>, GradeError> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|q| q.discipline_id == discipline_id && q.prompt_text == prompt)
            .cloned())
    }

    async fn create_question(&self, q: &NewQuestion) -> Result<i64, GradeError> {
        let mut questions = self.questions.lock().unwrap();
        let id = questions.len() as i64 + 1;
        questions.push(Question {
            id,
            discipline_id: q.discipline_id,
            code: q.code.clone(),
            prompt_text: q.prompt_text.clone(),
            ideal_text: q.ideal_text.clone(),
            required_keywords: q.required_keywords.clone(),
            metadata: json!({}),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_question(&self, id: i64, u: &QuestionUpdate) -> Result<(), GradeError> {
        let mut questions = self.questions.lock().unwrap();
        if let Some(q) = questions.iter_mut().find(|q| q.id == id) {
            if let Some(p) = &u.prompt_text {
                q.prompt_text = p.clone();
            }
            if let Some(i) = &u.ideal_text {
                q.ideal_text = Some(i.clone());
            }
            if let Some(k) = &u.required_keywords {
                q.required_keywords = Some(k.clone());
            }
        }
        Ok(())
    }

    async fn insert_submission(&self, s: &NewSubmission) -> Result<i64, GradeError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(s.clone());
        Ok(submissions.len() as i64)
    }
}

fn questions_sheet() -> Sheet {
    Sheet::from_values(&[
        vec![
            json!("Ключ"),
            json!("Вопрос"),
            json!("Идеальный ответ"),
            json!("Дисциплина"),
            json!("Ключевые слова"),
        ],
        vec![
            json!(1),
            json!("Что такое митоз?"),
            json!("Митоз — процесс деления клетки на две дочерние"),
            json!("Биология"),
            json!("митоз, делени, клетк"),
        ],
        vec![json!(2), json!("Что такое мейоз?"), json!(""), json!(""), json!("")],
        vec![json!(3), json!(""), json!("Ответ без вопроса"), json!("Биология"), json!("")],
    ])
}

#[tokio::test]
async fn test_questions_created_then_updated() {
    let store = MemoryStore::default();

    let report = import_questions(&store, &questions_sheet(), "Imported")
        .await
        .unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 1);
    assert!(report.errors[0].starts_with("row 3:"));

    {
        let disciplines = store.disciplines.lock().unwrap();
        let titles: Vec<_> = disciplines.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Биология", "Imported"]);
        assert_eq!(disciplines[0].code, "биология");
    }
    {
        let questions = store.questions.lock().unwrap();
        assert_eq!(questions[0].code.as_deref(), Some("1"));
        assert_eq!(questions[0].keywords(), vec!["митоз", "делени", "клетк"]);
        assert_eq!(questions[1].ideal_answer(), None);
    }

    // Second run: the same keys update in place.
    let mut sheet = questions_sheet();
    sheet.rows[0][2] = "Митоз: деление клетки".to_string();
    let report = import_questions(&store, &sheet, "Imported").await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 1);

    let questions = store.questions.lock().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].ideal_text.as_deref(), Some("Митоз: деление клетки"));
}

#[tokio::test]
async fn test_question_matched_by_prompt_without_key() {
    let store = MemoryStore::default();
    let first = Sheet::from_records(&[json!({ "Question": "Define osmosis", "Discipline": "Bio" })])
        .unwrap();
    import_questions(&store, &first, "Imported").await.unwrap();

    let second = Sheet::from_records(&[json!({
        "Question": "Define osmosis",
        "Discipline": "Bio",
        "Ideal answer": "Diffusion of water across a membrane"
    })])
    .unwrap();
    let report = import_questions(&store, &second, "Imported").await.unwrap();
    assert_eq!(report.updated, 1);

    let questions = store.questions.lock().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(
        questions[0].ideal_answer(),
        Some("Diffusion of water across a membrane")
    );
}

#[tokio::test]
async fn test_answers_become_submissions() {
    let store = MemoryStore::default();
    import_questions(&store, &questions_sheet(), "Imported")
        .await
        .unwrap();

    let answers = Sheet::from_values(&[
        vec![
            json!("ID студента"),
            json!("ФИО студента"),
            json!("Номер билета"),
            json!("Ответ на билет"),
            json!("Оценка"),
            json!("Название дисциплины"),
        ],
        vec![json!(501), json!("Иванов И."), json!(1), json!("Митоз это деление"), json!(4), json!("Биология")],
        vec![json!(502), json!("Петров П."), json!(9), json!("Не знаю"), json!(""), json!("Биология")],
        vec![json!(503), json!("Сидоров С."), json!(1), json!("..."), json!("отлично"), json!("Биология")],
    ]);

    let report = import_answers(&store, &answers, "Imported").await.unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.skipped, 1);

    let submissions = store.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 2);

    assert_eq!(submissions[0].user_id.as_deref(), Some("501"));
    assert_eq!(submissions[0].question_id, Some(1));
    assert_eq!(submissions[0].score, Some(4.0));
    assert_eq!(submissions[0].transcript_raw.as_deref(), Some("Митоз это деление"));
    assert_eq!(submissions[0].chat_id, None);
    assert_eq!(
        submissions[0].details,
        json!({ "import_source": "answers_sheet", "student_name": "Иванов И." })
    );

    assert_eq!(submissions[1].question_id, None);
    assert_eq!(submissions[1].details["student_name"], "Петров П.");
    assert_eq!(submissions[1].score, None);
}
