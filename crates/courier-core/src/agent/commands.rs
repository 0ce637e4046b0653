//! Slash commands understood by the host.

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Archive the conversation into memory and start over.
    New,
    /// List the available commands.
    Help,
    /// Cancel queued and running work for the conversation.
    Stop,
}

impl Command {
    /// Parse a message body. Only an exact command (case-insensitive,
    /// surrounding whitespace ignored) matches.
    pub fn parse(content: &str) -> Option<Self> {
        match content.trim().to_ascii_lowercase().as_str() {
            "/new" => Some(Self::New),
            "/help" => Some(Self::Help),
            "/stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

pub const HELP_TEXT: &str = "Commands:\n\
/new - archive this conversation to memory and start a fresh one\n\
/stop - cancel the request in progress and anything queued behind it\n\
/help - show this message";
