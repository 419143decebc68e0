//! Blocking SMTP listener feeding the capture pipeline

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::capture::MailIngestor;
use crate::capture::decoder::strip_line_ending;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{Envelope, SmtpSession};

/// SMTP server that hands every received message to a [`MailIngestor`]
#[derive(Debug, Clone)]
pub struct SmtpServer {
    /// Server hostname
    hostname: String,
    ingestor: Arc<MailIngestor>,
    next_id: Arc<AtomicU64>,
}

impl SmtpServer {
    pub fn new(hostname: &str, ingestor: Arc<MailIngestor>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            ingestor,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ingestor(&self) -> &Arc<MailIngestor> {
        &self.ingestor
    }

    /// Bind `addr` and serve forever (blocking)
    pub fn start(&self, addr: &str) -> Result<(), SmtpError> {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener)
    }

    /// Serve an already bound listener forever (blocking).
    ///
    /// Every connection gets its own thread.
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        info!(addr = %listener.local_addr()?, hostname = %self.hostname, "SMTP server listening");

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = server.handle_client(stream) {
                            warn!(error = %e, "error handling client");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "error accepting connection");
                }
            }
        }

        Ok(())
    }

    fn handle_client(&self, mut stream: TcpStream) -> Result<(), SmtpError> {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        debug!(peer = %peer, "client connected");

        let mut session = SmtpSession::new();
        let mut reader = BufReader::new(stream.try_clone()?);
        send_response(&mut stream, &SmtpResponse::greeting(&self.hostname))?;

        let mut line = Vec::new();
        loop {
            if read_line_capped(&mut reader, &mut line, MAX_LINE_READ)? == 0 {
                debug!(peer = %peer, "client disconnected");
                break;
            }
            let content = strip_line_ending(&line);

            if session.in_data_mode() {
                let response = match session.push_data_line(content) {
                    None => continue,
                    Some(Ok(envelope)) => {
                        self.deliver(&envelope, &peer);
                        SmtpResponse::ok()
                    }
                    Some(Err(e)) => e.to_response(),
                };
                send_response(&mut stream, &response)?;
                continue;
            }

            let command = String::from_utf8_lossy(content);
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            debug!(peer = %peer, command, "SMTP command");

            let response = session
                .handle_command(command, &self.hostname)
                .unwrap_or_else(|e| e.to_response());
            send_response(&mut stream, &response)?;
            if response.closes_connection() {
                break;
            }
        }

        Ok(())
    }

    /// Ingest the message once per recipient, each copy behind its own trace
    /// header
    fn deliver(&self, envelope: &Envelope, peer: &str) {
        for recipient in &envelope.recipients {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let preamble = self.trace_header(&envelope.client_domain, peer, recipient, id);
            let raw = preamble.as_bytes().chain(envelope.data.as_slice());
            self.ingestor.ingest(&envelope.from, recipient, raw);
        }
    }

    /// `Received:` header folded over exactly
    /// [`PREAMBLE_LINES`](crate::capture::PREAMBLE_LINES) lines
    fn trace_header(&self, client_domain: &str, peer: &str, recipient: &str, id: u64) -> String {
        format!(
            "Received: from {client_domain} ({peer})\r\n\
             \tby {host} with ESMTP (mailsink {version}) id {id:08X}\r\n\
             \tfor <{recipient}>;\r\n\
             \t{date}\r\n",
            host = self.hostname,
            version = env!("CARGO_PKG_VERSION"),
            date = Utc::now().to_rfc2822(),
        )
    }
}

/// Longest line kept in memory; anything past it is already over every
/// protocol limit and gets refused by the session.
const MAX_LINE_READ: usize = SmtpLimits::TEXT_LINE_MAX_LENGTH + 3;

/// Read one LF-terminated line into `line`, keeping at most `max` bytes.
///
/// The remainder of an overlong line is read and discarded. Returns the
/// number of bytes kept; 0 means end of stream.
fn read_line_capped<B: BufRead>(reader: &mut B, line: &mut Vec<u8>, max: usize) -> std::io::Result<usize> {
    line.clear();
    let kept = reader.by_ref().take(max as u64).read_until(b'\n', line)?;
    if kept == max && !line.ends_with(b"\n") {
        let mut discard = Vec::new();
        loop {
            discard.clear();
            let read = reader.by_ref().take(max as u64).read_until(b'\n', &mut discard)?;
            if read == 0 || discard.ends_with(b"\n") {
                break;
            }
        }
    }
    Ok(kept)
}

fn send_response(stream: &mut TcpStream, response: &SmtpResponse) -> Result<(), SmtpError> {
    let formatted = response.format();
    if formatted.len() > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
        let truncated = SmtpResponse::new(response.code, "Response too long (truncated)");
        stream.write_all(truncated.format().as_bytes())?;
    } else {
        stream.write_all(formatted.as_bytes())?;
    }
    stream.flush()?;
    Ok(())
}
