use shared::domain::SessionId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    New,
    List,
    Select(SessionId),
    Delete(SessionId),
    Search(String),
    Dismiss,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '/{0}', try /help")]
    Unknown(String),
    #[error("/{0} needs a session id")]
    MissingSessionId(&'static str),
}

pub const HELP: &str = "\
/new              start a new conversation
/list             list conversations grouped by recency
/select <id>      open a conversation
/delete <id>      delete a conversation
/search [term]    filter the list by title; no term clears the filter
/dismiss          hide the current error
/quit             exit
anything else is sent to the assistant";

/// Parses one input line. `None` for blank lines.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Ok(Command::Say(line.to_string())));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let command = match name.to_ascii_lowercase().as_str() {
        "new" => Ok(Command::New),
        "list" | "ls" => Ok(Command::List),
        "select" | "open" => session_argument("select", argument).map(Command::Select),
        "delete" | "rm" => session_argument("delete", argument).map(Command::Delete),
        "search" => Ok(Command::Search(argument.to_string())),
        "dismiss" => Ok(Command::Dismiss),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    };
    Some(command)
}

fn session_argument(command: &'static str, argument: &str) -> Result<SessionId, CommandError> {
    if argument.is_empty() {
        return Err(CommandError::MissingSessionId(command));
    }
    Ok(SessionId::new(argument))
}
