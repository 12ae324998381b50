//! Bulk import of questions and graded answers from spreadsheet exports.

pub mod headers;
pub mod import;
pub mod source;

pub use import::{import_answers, import_questions, ImportReport, ImportStore, PgImportStore};
pub use source::{load_json_file, Sheet, SheetsClient, SourceError};
