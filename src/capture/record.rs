//! Captured message records and ingestion outcomes

use chrono::{DateTime, Utc};

/// A message captured from one ingestion.
///
/// Fields are fixed at construction; observers read them through accessors
/// and clone the record if they need to keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRecord {
    sender: String,
    recipient: String,
    subject: String,
    body: String,
    received_at: DateTime<Utc>,
}

impl MailRecord {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            received_at,
        }
    }

    /// Envelope sender, as given by the protocol engine
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Envelope recipient, as given by the protocol engine
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Subject header value, empty when the message has none
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Decoded message text without the preamble
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Result of one ingestion, delivered to every observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// The recipient passed the relay filter, or no filter is configured
    Accepted(MailRecord),
    /// The recipient matched none of the relay domains
    Rejected(MailRecord),
}

impl IngestionOutcome {
    pub fn record(&self) -> &MailRecord {
        match self {
            IngestionOutcome::Accepted(record) | IngestionOutcome::Rejected(record) => record,
        }
    }

    pub fn into_record(self) -> MailRecord {
        match self {
            IngestionOutcome::Accepted(record) | IngestionOutcome::Rejected(record) => record,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestionOutcome::Accepted(_))
    }
}
