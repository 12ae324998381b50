//! Spreadsheet header recognition.
//!
//! Each importable field has a fixed list of accepted header aliases. A header
//! is compared after trimming and lowercasing. Exact alias matches are
//! resolved first for every field, then alias-prefix matches; within a pass,
//! fields claim headers in table order and a header is claimed at most once.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionField {
    Prompt,
    Ideal,
    Discipline,
    Keywords,
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerField {
    Discipline,
    Ticket,
    Answer,
    Grade,
    StudentName,
    StudentId,
}

/// Questions sheet. `Keywords` precedes `Key` so that "ключевые слова" is not
/// taken for a question key.
pub const QUESTION_ALIASES: &[(QuestionField, &[&str])] = &[
    (
        QuestionField::Prompt,
        &["вопрос", "текст вопроса", "question", "prompt"],
    ),
    (
        QuestionField::Ideal,
        &["идеальный ответ", "идеаль", "эталон", "ответ", "ideal", "answer"],
    ),
    (
        QuestionField::Discipline,
        &["дисциплина", "название дисциплины", "дисцип", "discipline", "course", "subject"],
    ),
    (
        QuestionField::Keywords,
        &["ключевые слова", "ключевые", "keywords", "required keywords"],
    ),
    (
        QuestionField::Key,
        &["ключ", "код", "номер билета", "question key", "question id", "key", "code", "id"],
    ),
];

pub const ANSWER_ALIASES: &[(AnswerField, &[&str])] = &[
    (
        AnswerField::Discipline,
        &["название дисциплины", "дисциплина", "дисцип", "discipline", "course", "subject"],
    ),
    (AnswerField::Ticket, &["номер билета", "билет", "ticket"]),
    (
        AnswerField::Answer,
        &["ответ на билет", "ответ", "answer", "text"],
    ),
    (AnswerField::Grade, &["оценка", "балл", "grade", "score"]),
    (
        AnswerField::StudentName,
        &["фио студента", "фио", "student name", "name"],
    ),
    (
        AnswerField::StudentId,
        &["id студента", "student id", "student_id", "student", "id"],
    ),
];

fn canonical(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Map each recognized field to the header that carries it.
pub fn resolve<F>(headers: &[String], table: &[(F, &[&str])]) -> HashMap<F, String>
where
    F: Copy + Eq + Hash,
{
    let canon: Vec<String> = headers.iter().map(|h| canonical(h)).collect();
    let mut claimed = vec![false; headers.len()];
    let mut resolved = HashMap::new();

    let exact = |h: &str, alias: &str| h == alias;
    let prefix = |h: &str, alias: &str| h.starts_with(alias);
    let passes: [&dyn Fn(&str, &str) -> bool; 2] = [&exact, &prefix];

    for matches in passes {
        for (field, aliases) in table {
            if resolved.contains_key(field) {
                continue;
            }
            let hit = canon.iter().enumerate().find(|(i, h)| {
                !claimed[*i] && aliases.iter().any(|alias| matches(h.as_str(), alias))
            });
            if let Some((i, _)) = hit {
                claimed[i] = true;
                resolved.insert(*field, headers[i].clone());
            }
        }
    }
    resolved
}
