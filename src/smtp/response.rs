//! SMTP replies

/// A reply sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// Reply code (e.g. 250, 354, 500)
    pub code: u16,
    /// Text of the last (or only) line
    pub message: String,
    /// Leading lines of a multiline reply
    pub extra: Vec<String>,
}

impl SmtpResponse {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extra: Vec::new(),
        }
    }

    /// 250 OK
    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    /// 220 greeting
    pub fn greeting(hostname: &str) -> Self {
        Self::new(220, format!("{hostname} ESMTP mailsink ready"))
    }

    /// 250 reply to HELO
    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new(250, format!("{hostname} Hello {client_domain}"))
    }

    /// Multiline 250 reply to EHLO listing capabilities
    pub fn ehlo(hostname: &str, client_domain: &str, max_size: usize) -> Self {
        Self {
            code: 250,
            message: format!("SIZE {max_size}"),
            extra: vec![format!("{hostname} Hello {client_domain}"), "8BITMIME".to_string()],
        }
    }

    /// 354 intermediate reply to DATA
    pub fn data_start() -> Self {
        Self::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    /// 221 reply to QUIT
    pub fn quit() -> Self {
        Self::new(221, "Bye")
    }

    pub fn closes_connection(&self) -> bool {
        self.code == 221 || self.code == 421
    }

    /// Wire form, CRLF terminated
    pub fn format(&self) -> String {
        let mut out = String::new();
        for line in &self.extra {
            out.push_str(&format!("{}-{}\r\n", self.code, line));
        }
        out.push_str(&format!("{} {}\r\n", self.code, self.message));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_format() {
        assert_eq!(SmtpResponse::ok().format(), "250 OK\r\n");
        assert_eq!(SmtpResponse::quit().format(), "221 Bye\r\n");
    }

    #[test]
    fn test_multiline_format() {
        let reply = SmtpResponse::ehlo("test.local", "client", 1024);
        assert_eq!(
            reply.format(),
            "250-test.local Hello client\r\n250-8BITMIME\r\n250 SIZE 1024\r\n"
        );
    }

    #[test]
    fn test_closes_connection() {
        assert!(SmtpResponse::quit().closes_connection());
        assert!(!SmtpResponse::ok().closes_connection());
    }
}
