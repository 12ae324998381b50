//! Chat commands for choosing what an answer is graded against.

use grader_core::GradeError;

use crate::subsystems::notifier::Notifier;
use crate::subsystems::store::GradingStore;

pub const HELP_TEXT: &str = "Commands:\n\
/disciplines - list disciplines\n\
/setdiscipline <id> - choose a discipline\n\
/currentdiscipline - show the current discipline\n\
/setquestion <id> - choose the question your next answers are graded against";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Disciplines,
    /// `None` when the argument is missing or not an integer.
    SetDiscipline(Option<i64>),
    CurrentDiscipline,
    SetQuestion(Option<i64>),
    Help,
}

/// Parse a slash command, tolerating a `@botname` suffix. Returns `None` for
/// plain text and for unknown commands.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let name = head.split('@').next().unwrap_or_default();
    let arg = parts.next().and_then(|a| a.parse::<i64>().ok());

    match name {
        "/disciplines" => Some(Command::Disciplines),
        "/setdiscipline" => Some(Command::SetDiscipline(arg)),
        "/currentdiscipline" => Some(Command::CurrentDiscipline),
        "/setquestion" => Some(Command::SetQuestion(arg)),
        "/help" | "/start" => Some(Command::Help),
        _ => None,
    }
}

pub async fn handle_command(
    store: &dyn GradingStore,
    notifier: &dyn Notifier,
    chat_id: i64,
    command: Command,
) -> Result<(), GradeError> {
    let reply = match command {
        Command::Disciplines => {
            let disciplines = store.list_disciplines().await?;
            if disciplines.is_empty() {
                "No disciplines found. Import questions first.".to_string()
            } else {
                let lines: Vec<String> = disciplines
                    .iter()
                    .map(|d| format!("{}. {} ({})", d.id, d.title, d.code))
                    .collect();
                format!(
                    "Available disciplines:\n{}\n\nChoose one with /setdiscipline <id>",
                    lines.join("\n")
                )
            }
        }
        Command::SetDiscipline(None) => {
            "Invalid discipline id. Use /disciplines for the list.".to_string()
        }
        Command::SetDiscipline(Some(id)) => match store.set_chat_discipline(chat_id, id).await? {
            Some(d) => format!("Discipline set: {} (id={})", d.title, d.id),
            None => format!("Discipline id={} not found. Use /disciplines for the list.", id),
        },
        Command::CurrentDiscipline => match store.chat_setting(chat_id).await? {
            Some(setting) => match setting.discipline_id {
                Some(id) => match setting.question_id {
                    Some(q) => format!("Current discipline id={}, question id={}", id, q),
                    None => format!("Current discipline id={}", id),
                },
                None => "No discipline selected. Use /disciplines for the list.".to_string(),
            },
            None => "No discipline selected. Use /disciplines for the list.".to_string(),
        },
        Command::SetQuestion(None) => "Invalid question id.".to_string(),
        Command::SetQuestion(Some(id)) => match store.set_chat_question(chat_id, id).await? {
            Some(q) if q.ideal_answer().is_some() => {
                format!("Question set (id={}): {}", q.id, q.prompt_text)
            }
            Some(q) => format!(
                "Question set (id={}): {}\nIt has no reference answer, so answers will not be scored.",
                q.id, q.prompt_text
            ),
            None => format!("Question id={} not found.", id),
        },
        Command::Help => HELP_TEXT.to_string(),
    };

    tracing::debug!(chat_id, "Replying to command");
    notifier.notify(chat_id, &reply).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command("/disciplines"), Some(Command::Disciplines));
        assert_eq!(parse_command("/setdiscipline 3"), Some(Command::SetDiscipline(Some(3))));
        assert_eq!(parse_command("/setdiscipline abc"), Some(Command::SetDiscipline(None)));
        assert_eq!(parse_command("/setdiscipline"), Some(Command::SetDiscipline(None)));
        assert_eq!(parse_command("/SetQuestion@GraderBot 12"), Some(Command::SetQuestion(Some(12))));
        assert_eq!(parse_command("  /start "), Some(Command::Help));
        assert_eq!(parse_command("/currentdiscipline"), Some(Command::CurrentDiscipline));
    }

    #[test]
    fn test_parse_rejects_text_and_unknown() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
    }
}
