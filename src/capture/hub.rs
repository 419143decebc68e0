//! Publish/subscribe delivery of ingestion outcomes

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak, mpsc};

use tracing::error;

use crate::capture::record::IngestionOutcome;

/// Receives outcomes published by a [`NotificationHub`]
pub trait Observer: Send + Sync {
    fn notify(&self, outcome: &IngestionOutcome);
}

impl<F> Observer for F
where
    F: Fn(&IngestionOutcome) + Send + Sync,
{
    fn notify(&self, outcome: &IngestionOutcome) {
        self(outcome)
    }
}

type Registered = (u64, Arc<dyn Observer>);

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    observers: RwLock<Vec<Registered>>,
}

impl HubInner {
    fn remove(&self, id: u64) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(observer_id, _)| *observer_id != id);
    }
}

/// Ordered set of observers with synchronous broadcast.
///
/// Cloning a hub yields another handle to the same observer set.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer behind every already registered one.
    ///
    /// The observer stays registered until the returned handle is dropped.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let observer: Arc<dyn Observer> = Arc::new(observer);
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));

        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Register an observer that forwards a copy of every outcome to a channel
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::Receiver<IngestionOutcome>) {
        let (tx, rx) = mpsc::channel();
        let subscription = self.subscribe(move |outcome: &IngestionOutcome| {
            // Fails only once the receiver is gone; nothing left to deliver to.
            let _ = tx.send(outcome.clone());
        });
        (subscription, rx)
    }

    /// Deliver `outcome` to every observer in registration order on the
    /// calling thread.
    ///
    /// The observer list is snapshotted first, so observers may subscribe or
    /// unsubscribe from inside a callback; such changes apply to the next
    /// publish. A panicking observer is logged and skipped. Returns the
    /// number of observers that returned normally.
    pub fn publish(&self, outcome: &IngestionOutcome) -> usize {
        let observers: Vec<Arc<dyn Observer>> = self
            .inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        let mut delivered = 0;
        for observer in observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.notify(outcome))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    recipient = outcome.record().recipient(),
                    accepted = outcome.is_accepted(),
                    "observer panicked during notification"
                ),
            }
        }
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Registration handle returned by [`NotificationHub::subscribe`]
#[must_use = "dropping a Subscription unregisters its observer"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Keep the observer registered for as long as the hub lives
    pub fn detach(mut self) {
        self.hub = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
