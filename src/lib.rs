//! # mailsink
//!
//! mailsink is a local mail catcher for testing.
//!
//! Applications send mail to it over SMTP; every received message is turned
//! into a [`MailRecord`], checked against an optional list of relay domains,
//! and published to observers as an [`IngestionOutcome`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mailsink::{CaptureConfig, MailIngestor, SmtpServer};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let ingestor = Arc::new(MailIngestor::from_config(&CaptureConfig::default()).unwrap());
//! let (_subscription, rx) = ingestor.hub().subscribe_channel();
//!
//! let server = SmtpServer::new("test.local", Arc::clone(&ingestor));
//! thread::spawn(move || {
//!     let _ = server.start("127.0.0.1:2525");
//! });
//!
//! // Application sends email to localhost:2525
//! // ...
//!
//! if let Ok(outcome) = rx.recv_timeout(Duration::from_millis(100)) {
//!     println!("Received email for: {}", outcome.record().recipient());
//! }
//! ```
//!
//! ## Ingestion
//!
//! The SMTP front end prefixes each message with a four-line `Received:`
//! header and calls [`MailIngestor::ingest`] once per recipient. The
//! ingestor:
//!
//! - decodes the stream with the configured charset, dropping the four
//!   preamble lines,
//! - takes the subject from the first line that is exactly `Subject: ...`,
//! - accepts the recipient if no relay domains are configured or it ends with
//!   one of them,
//! - publishes `Accepted` under its lock, or `Rejected` without it.
//!
//! Decoding never fails the intake; read errors are logged and leave a
//! partial body.
//!
//! ## Observers
//!
//! Register closures with [`NotificationHub::subscribe`] or take a channel
//! with [`NotificationHub::subscribe_channel`]. Observers run synchronously
//! on the connection thread, in registration order. A panicking observer is
//! logged and the remaining observers still run.
//!
//! Consumers that modify their own mailbox view (clearing a list while mail
//! keeps arriving) hold [`MailIngestor::lock`] to keep accepted notifications
//! out meanwhile. The lock is reentrant, so an observer can take it too.
//!
//! ## Notes
//!
//! - Runs in-memory only. Email persistence is not supported.
//! - SMTP authentication and TLS are not supported.
//! - The SMTP dialogue follows the RFC 821 minimum with EHLO added.

pub mod capture;
pub mod logging;
pub mod smtp;

pub use capture::{
    CaptureConfig, ConfigError, IngestionOutcome, MailIngestor, MailRecord, NotificationHub,
    Observer, RelayFilter, StreamDecoder, Subscription,
};
pub use smtp::{SmtpError, SmtpServer};
