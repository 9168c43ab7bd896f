//! Parsing of user input lines.
//!
//! | input                 | result                                        |
//! |-----------------------|-----------------------------------------------|
//! | `hello`               | text frame `hello`, sent as typed             |
//! | `/to <id> <message>`  | text frame holding a `"direct"` envelope      |
//! | `/quit`               | close the session                             |
//! | empty line            | nothing is sent                               |
//!
//! Any other line starting with `/` is sent as ordinary text, so messages
//! such as `/shrug` still reach the other clients.

use hubcast_core::{Envelope, EnvelopeError};
use thiserror::Error;

const CMD_TO: &str = "/to";
const CMD_QUIT: &str = "/quit";

/// Error returned for a malformed client command.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("usage: /to <connection-id> <message>")]
    MissingTarget,
    #[error("no message given for /to {0}")]
    MissingMessage(String),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] EnvelopeError),
}

/// What a single input line asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Send this text frame.
    Send(String),
    /// Close the session and exit.
    Quit,
    /// Nothing to do (empty line).
    Skip,
}

/// Parses one line of user input.
///
/// A trailing `\n` or `\r\n` is stripped; the rest of the line is sent
/// unchanged.
///
/// # Errors
///
/// Returns [`InputError`] if a `/to` command is missing its target or its
/// message.
pub fn parse_line(line: &str) -> Result<InputCommand, InputError> {
    let line = strip_terminator(line);

    if line.is_empty() {
        return Ok(InputCommand::Skip);
    }
    if line == CMD_QUIT {
        return Ok(InputCommand::Quit);
    }

    match line.split_once(' ') {
        Some((CMD_TO, rest)) => parse_direct(rest),
        None if line == CMD_TO => Err(InputError::MissingTarget),
        _ => Ok(InputCommand::Send(line.to_string())),
    }
}

fn parse_direct(rest: &str) -> Result<InputCommand, InputError> {
    let rest = rest.trim_start();
    let (to, message) = match rest.split_once(' ') {
        Some((to, message)) => (to, message),
        None if rest.is_empty() => return Err(InputError::MissingTarget),
        None => return Err(InputError::MissingMessage(rest.to_string())),
    };
    if message.is_empty() {
        return Err(InputError::MissingMessage(to.to_string()));
    }

    let json = Envelope::direct(to, message).to_json()?;
    Ok(InputCommand::Send(json))
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_sent_unchanged() {
        assert_eq!(
            parse_line("hello, world").unwrap(),
            InputCommand::Send("hello, world".to_string())
        );
    }

    #[test]
    fn test_line_terminators_are_stripped() {
        assert_eq!(parse_line("hi\n").unwrap(), InputCommand::Send("hi".to_string()));
        assert_eq!(parse_line("hi\r\n").unwrap(), InputCommand::Send("hi".to_string()));
    }

    #[test]
    fn test_surrounding_spaces_are_kept() {
        assert_eq!(
            parse_line("  indented ").unwrap(),
            InputCommand::Send("  indented ".to_string())
        );
    }

    #[test]
    fn test_empty_line_is_skipped() {
        assert_eq!(parse_line("").unwrap(), InputCommand::Skip);
        assert_eq!(parse_line("\n").unwrap(), InputCommand::Skip);
    }

    #[test]
    fn test_quit_command() {
        assert_eq!(parse_line("/quit").unwrap(), InputCommand::Quit);
        assert_eq!(parse_line("/quit\r\n").unwrap(), InputCommand::Quit);
    }

    #[test]
    fn test_to_command_builds_direct_envelope() {
        // Act
        let command = parse_line("/to abc-123 see you at noon").unwrap();

        // Assert
        let InputCommand::Send(json) = command else {
            panic!("expected a frame to send, got {command:?}");
        };
        let envelope = Envelope::parse(&json).unwrap();
        assert!(envelope.is_direct());
        assert_eq!(envelope.to.as_deref(), Some("abc-123"));
        assert_eq!(envelope.data, "see you at noon");
    }

    #[test]
    fn test_to_without_target_is_an_error() {
        assert!(matches!(parse_line("/to"), Err(InputError::MissingTarget)));
        assert!(matches!(parse_line("/to "), Err(InputError::MissingTarget)));
    }

    #[test]
    fn test_to_without_message_is_an_error() {
        assert!(matches!(
            parse_line("/to abc"),
            Err(InputError::MissingMessage(id)) if id == "abc"
        ));
        assert!(matches!(
            parse_line("/to abc "),
            Err(InputError::MissingMessage(id)) if id == "abc"
        ));
    }

    #[test]
    fn test_unknown_slash_command_is_sent_as_text() {
        assert_eq!(
            parse_line("/shrug ok").unwrap(),
            InputCommand::Send("/shrug ok".to_string())
        );
        assert_eq!(
            parse_line("/total").unwrap(),
            InputCommand::Send("/total".to_string())
        );
    }
}
