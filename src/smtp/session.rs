//! SMTP session state and command handling

use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;

/// Where the session is in the SMTP dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Waiting for HELO/EHLO
    Initial,
    /// Greeted, ready for MAIL
    Greeted,
    /// MAIL FROM accepted, waiting for RCPT
    MailReceived,
    /// At least one RCPT TO accepted
    RecipientsReceived,
    /// Collecting message data until the lone dot
    DataMode,
}

/// A finished mail transaction, handed to delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Domain given with HELO/EHLO
    pub client_domain: String,
    /// Reverse path; empty for the null sender
    pub from: String,
    pub recipients: Vec<String>,
    /// Message lines, dot-unstuffed, each terminated by CRLF
    pub data: Vec<u8>,
}

/// State for a single client connection
#[derive(Debug)]
pub struct SmtpSession {
    state: SmtpState,
    client_domain: Option<String>,
    from: Option<String>,
    to: Vec<String>,
    data: Vec<u8>,
    data_error: Option<SmtpError>,
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpSession {
    pub fn new() -> Self {
        Self {
            state: SmtpState::Initial,
            client_domain: None,
            from: None,
            to: Vec::new(),
            data: Vec::new(),
            data_error: None,
        }
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn in_data_mode(&self) -> bool {
        self.state == SmtpState::DataMode
    }

    pub fn client_domain(&self) -> Option<&str> {
        self.client_domain.as_deref()
    }

    /// Clear the current transaction, keeping the greeting
    pub fn reset(&mut self) {
        self.from = None;
        self.to.clear();
        self.data.clear();
        self.data_error = None;
        self.state = if self.client_domain.is_some() {
            SmtpState::Greeted
        } else {
            SmtpState::Initial
        };
    }

    /// Process one command line (without its line ending)
    pub fn handle_command(
        &mut self,
        command_line: &str,
        hostname: &str,
    ) -> Result<SmtpResponse, SmtpError> {
        if command_line.len() + 2 > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
            return Err(SmtpError::LineTooLong {
                max: SmtpLimits::COMMAND_LINE_MAX_LENGTH,
            });
        }

        let (verb, argument) = command_line
            .split_once(' ')
            .unwrap_or((command_line, ""));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => self.greet(argument).map(|domain| SmtpResponse::helo(hostname, domain)),
            "EHLO" => self.greet(argument).map(|domain| {
                SmtpResponse::ehlo(hostname, domain, SmtpLimits::MAX_DATA_SIZE)
            }),
            "MAIL" => self.handle_mail(argument),
            "RCPT" => self.handle_rcpt(argument),
            "DATA" => self.handle_data(argument),
            "RSET" => {
                self.reset();
                Ok(SmtpResponse::ok())
            }
            "NOOP" => Ok(SmtpResponse::ok()),
            "QUIT" => Ok(SmtpResponse::quit()),
            _ => Err(SmtpError::InvalidCommand),
        }
    }

    fn greet<'a>(&mut self, argument: &'a str) -> Result<&'a str, SmtpError> {
        let domain = argument.trim();
        if domain.is_empty() {
            return Err(SmtpError::InvalidSyntax("HELO requires domain argument"));
        }
        self.client_domain = Some(domain.to_string());
        self.reset();
        Ok(domain)
    }

    fn handle_mail(&mut self, argument: &str) -> Result<SmtpResponse, SmtpError> {
        match self.state {
            SmtpState::Initial => return Err(SmtpError::InvalidState("MAIL requires HELO first")),
            SmtpState::Greeted => {}
            _ => return Err(SmtpError::InvalidState("nested MAIL command")),
        }

        let from = parse_path(argument, "FROM:")?;
        self.from = Some(from.to_string());
        self.state = SmtpState::MailReceived;
        Ok(SmtpResponse::ok())
    }

    fn handle_rcpt(&mut self, argument: &str) -> Result<SmtpResponse, SmtpError> {
        if !matches!(
            self.state,
            SmtpState::MailReceived | SmtpState::RecipientsReceived
        ) {
            return Err(SmtpError::InvalidState("RCPT requires MAIL first"));
        }

        let to = parse_path(argument, "TO:")?;
        if to.is_empty() {
            return Err(SmtpError::InvalidSyntax("TO address cannot be empty"));
        }
        if self.to.len() >= SmtpLimits::MAX_RECIPIENTS {
            return Err(SmtpError::TooManyRecipients {
                max: SmtpLimits::MAX_RECIPIENTS,
            });
        }

        self.to.push(to.to_string());
        self.state = SmtpState::RecipientsReceived;
        Ok(SmtpResponse::ok())
    }

    fn handle_data(&mut self, argument: &str) -> Result<SmtpResponse, SmtpError> {
        if self.state != SmtpState::RecipientsReceived {
            return Err(SmtpError::InvalidState("DATA requires RCPT first"));
        }
        if !argument.trim().is_empty() {
            return Err(SmtpError::InvalidSyntax("DATA command takes no arguments"));
        }

        self.data.clear();
        self.data_error = None;
        self.state = SmtpState::DataMode;
        Ok(SmtpResponse::data_start())
    }

    /// Feed one data line (without its line ending).
    ///
    /// Returns `None` while the message continues. On the terminating dot the
    /// transaction is finished and the session is ready for the next MAIL;
    /// a size violation seen anywhere in the data is reported then.
    pub fn push_data_line(&mut self, line: &[u8]) -> Option<Result<Envelope, SmtpError>> {
        if line == b"." {
            let result = match self.data_error.take() {
                Some(e) => Err(e),
                None => Ok(Envelope {
                    client_domain: self.client_domain.clone().unwrap_or_default(),
                    from: self.from.take().unwrap_or_default(),
                    recipients: std::mem::take(&mut self.to),
                    data: std::mem::take(&mut self.data),
                }),
            };
            self.reset();
            return Some(result);
        }

        if self.data_error.is_some() {
            return None;
        }

        let line = line.strip_prefix(b".").unwrap_or(line);
        let line_size = line.len() + 2;
        if line_size > SmtpLimits::TEXT_LINE_MAX_LENGTH {
            self.data_error = Some(SmtpError::LineTooLong {
                max: SmtpLimits::TEXT_LINE_MAX_LENGTH,
            });
        } else if self.data.len() + line_size > SmtpLimits::MAX_DATA_SIZE {
            self.data_error = Some(SmtpError::TooMuchData {
                max: SmtpLimits::MAX_DATA_SIZE,
            });
        } else {
            self.data.extend_from_slice(line);
            self.data.extend_from_slice(b"\r\n");
        }
        None
    }
}

/// Extract the path from `FROM:<path> [params]` / `TO:<path> [params]`
fn parse_path<'a>(argument: &'a str, keyword: &str) -> Result<&'a str, SmtpError> {
    let argument = argument.trim_start();
    let rest = argument
        .get(..keyword.len())
        .filter(|head| head.eq_ignore_ascii_case(keyword))
        .map(|_| argument[keyword.len()..].trim_start())
        .ok_or(SmtpError::InvalidSyntax("expected FROM:<address> or TO:<address>"))?;

    let path = rest
        .strip_prefix('<')
        .and_then(|inner| inner.split_once('>'))
        .map(|(path, _)| path)
        .ok_or(SmtpError::InvalidSyntax("address must be enclosed in angle brackets"))?;

    if path.len() > SmtpLimits::PATH_MAX_LENGTH {
        return Err(SmtpError::PathTooLong {
            max: SmtpLimits::PATH_MAX_LENGTH,
        });
    }
    Ok(path)
}
