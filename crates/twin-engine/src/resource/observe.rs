use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Change notification fan-out.
///
/// Observers either poll [`revision`](Self::revision) (bumped on every
/// change) or hold a receiver from [`subscribe`](Self::subscribe).
/// Disconnected subscribers are pruned on the next notification.
#[derive(Debug)]
pub struct ChangeFeed<E> {
    revision: AtomicU64,
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone> ChangeFeed<E> {
    pub fn new() -> Self {
        Self {
            revision: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Bumps the revision and delivers `events` to every live subscriber.
    ///
    /// Must be called without holding the owning resource's lock.
    pub fn publish(&self, events: &[E]) {
        if events.is_empty() {
            return;
        }
        self.revision.fetch_add(events.len() as u64, Ordering::AcqRel);

        let Ok(mut subs) = self.subscribers.lock() else { return };
        subs.retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
    }
}

impl<E: Clone> Default for ChangeFeed<E> {
    fn default() -> Self {
        Self::new()
    }
}
