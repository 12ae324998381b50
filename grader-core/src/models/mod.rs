pub mod chat_setting;
pub mod discipline;
pub mod question;
pub mod submission;

pub use chat_setting::ChatSetting;
pub use discipline::Discipline;
pub use question::{NewQuestion, Question};
pub use submission::{NewSubmission, Submission};
