//! Error types for the SMTP front end

use thiserror::Error;

use crate::smtp::response::SmtpResponse;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid state for command: {0}")]
    InvalidState(&'static str),

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(&'static str),

    #[error("Line too long (max {max} characters)")]
    LineTooLong { max: usize },

    #[error("Path too long (max {max} characters)")]
    PathTooLong { max: usize },

    #[error("Too many recipients (max {max})")]
    TooManyRecipients { max: usize },

    #[error("Too much mail data (max {max} bytes)")]
    TooMuchData { max: usize },
}

/// SMTP size limits as defined in RFC 821
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a path (reverse-path or forward-path)
    pub const PATH_MAX_LENGTH: usize = 256;

    /// Maximum length of a command line including CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;

    /// Maximum length of a text line including CRLF
    pub const TEXT_LINE_MAX_LENGTH: usize = 1000;

    /// Maximum number of recipients per message
    pub const MAX_RECIPIENTS: usize = 100;

    /// Maximum total size of message data
    pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024;
}

impl SmtpError {
    /// Reply sent to the client for this error
    pub fn to_response(&self) -> SmtpResponse {
        let code = match self {
            SmtpError::Io(_) => 421,
            SmtpError::InvalidCommand | SmtpError::LineTooLong { .. } => 500,
            SmtpError::InvalidSyntax(_) | SmtpError::PathTooLong { .. } => 501,
            SmtpError::InvalidState(_) => 503,
            SmtpError::TooManyRecipients { .. } | SmtpError::TooMuchData { .. } => 552,
        };
        let message = match self {
            SmtpError::Io(_) => "Service not available".to_string(),
            SmtpError::InvalidCommand => "Syntax error, command unrecognized".to_string(),
            SmtpError::InvalidState(msg) => format!("Bad sequence of commands: {msg}"),
            other => other.to_string(),
        };
        SmtpResponse::new(code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_replies() {
        let reply = SmtpError::InvalidState("MAIL first").to_response();
        assert_eq!(reply.code, 503);
        assert_eq!(reply.message, "Bad sequence of commands: MAIL first");

        let reply = SmtpError::TooManyRecipients { max: 100 }.to_response();
        assert_eq!(reply.code, 552);
        assert_eq!(reply.message, "Too many recipients (max 100)");

        assert_eq!(SmtpError::InvalidCommand.to_response().code, 500);
        assert_eq!(SmtpError::InvalidSyntax("bad").to_response().code, 501);
    }
}
