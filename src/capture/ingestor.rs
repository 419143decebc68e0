//! Single-message ingestion pipeline

use std::io::Read;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use chrono::Utc;
use tracing::debug;

use crate::capture::config::CaptureConfig;
use crate::capture::decoder::StreamDecoder;
use crate::capture::error::ConfigError;
use crate::capture::hub::NotificationHub;
use crate::capture::record::{IngestionOutcome, MailRecord};
use crate::capture::relay::RelayFilter;
use crate::capture::subject;

/// Turns raw submissions into [`MailRecord`]s and publishes the outcome.
///
/// `ingest` may be called from many connection threads at once. Decoding and
/// filtering run unsynchronized; publishing an accepted message holds the
/// ingestor's lock, which consumers can also take through [`lock`] to keep
/// accepted notifications out while they rework their own mailbox state.
/// The lock is reentrant, so an observer may call [`lock`] from inside an
/// accepted notification.
///
/// [`lock`]: MailIngestor::lock
#[derive(Debug)]
pub struct MailIngestor {
    decoder: StreamDecoder,
    relay: RelayFilter,
    hub: NotificationHub,
    publish_lock: PublishLock,
}

impl MailIngestor {
    /// Create an ingestor publishing to a fresh hub
    pub fn new(decoder: StreamDecoder, relay: RelayFilter) -> Self {
        Self::with_hub(decoder, relay, NotificationHub::new())
    }

    pub fn with_hub(decoder: StreamDecoder, relay: RelayFilter, hub: NotificationHub) -> Self {
        Self {
            decoder,
            relay,
            hub,
            publish_lock: PublishLock::default(),
        }
    }

    /// Build an ingestor from configuration, failing fast on a missing or
    /// unusable storage charset
    pub fn from_config(config: &CaptureConfig) -> Result<Self, ConfigError> {
        let encoding = config.storage.encoding()?;
        Ok(Self::new(
            StreamDecoder::new(encoding),
            config.relay.filter(),
        ))
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn relay(&self) -> &RelayFilter {
        &self.relay
    }

    pub fn decoder(&self) -> &StreamDecoder {
        &self.decoder
    }

    /// Take the lock that serializes accepted-message notifications.
    ///
    /// Blocks while another thread holds it. The thread already holding it
    /// (including an observer running inside an accepted notification) gets
    /// a nested guard right away.
    pub fn lock(&self) -> PublishGuard<'_> {
        self.publish_lock.acquire()
    }

    /// Capture one message and notify observers.
    ///
    /// `raw` must start with the protocol engine's preamble lines. Exactly one
    /// outcome is published per call; decoding problems degrade to partial or
    /// empty fields instead of failing.
    pub fn ingest<R: Read>(&self, from: &str, to: &str, raw: R) {
        let record = self.build_record(from, to, raw);

        if !self.relay.accepts(to) {
            debug!(from, to, "publishing rejected message");
            // Rejections are not serialized against accepted notifications.
            self.hub.publish(&IngestionOutcome::Rejected(record));
            return;
        }

        let _guard = self.lock();
        debug!(from, to, "publishing accepted message");
        self.hub.publish(&IngestionOutcome::Accepted(record));
    }

    fn build_record<R: Read>(&self, from: &str, to: &str, raw: R) -> MailRecord {
        let body = self.decoder.decode(raw);
        let subject = subject::extract(&body);
        MailRecord::new(from, to, subject, body, Utc::now())
    }
}

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Reentrant lock keyed by the owning thread
#[derive(Debug, Default)]
struct PublishLock {
    state: Mutex<Ownership>,
    released: Condvar,
}

impl PublishLock {
    fn acquire(&self) -> PublishGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.owner.is_some_and(|owner| owner != me) {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.owner = Some(me);
        state.depth += 1;

        PublishGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }
}

/// Guard returned by [`MailIngestor::lock`]; releases one level on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PublishGuard<'a> {
    lock: &'a PublishLock,
    // Ownership is recorded per thread, so the guard must stay on it.
    _not_send: PhantomData<*const ()>,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
