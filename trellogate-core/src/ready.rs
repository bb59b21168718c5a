//! Named readiness signals scoped to one client.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

/// A set of named values that callers can wait on.
///
/// `wait_until` resolves immediately for a name that is already ready and
/// otherwise when [`mark_ready`](Self::mark_ready) is called for it. The
/// registry lives and dies with its owner; nothing is process-wide.
pub struct ReadinessRegistry<T> {
    slots: Mutex<HashMap<String, watch::Sender<Option<T>>>>,
}

impl<T: Clone + Send + Sync> ReadinessRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn subscribe(&self, name: &str) -> watch::Receiver<Option<T>> {
        self.slots
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Mark `name` ready with `value`, waking every waiter.
    pub fn mark_ready(&self, name: &str, value: T) {
        self.slots
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(value));
    }

    /// Mark `name` not ready; later waiters block until it is marked again.
    pub fn reset(&self, name: &str) {
        if let Some(slot) = self.slots.lock().get(name) {
            slot.send_replace(None);
        }
    }

    /// The current value of `name`, if ready.
    pub fn value(&self, name: &str) -> Option<T> {
        self.slots
            .lock()
            .get(name)
            .and_then(|slot| (*slot.borrow()).clone())
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Wait until `name` is ready and return its value.
    pub async fn wait_until(&self, name: &str) -> T {
        let mut receiver = self.subscribe(name);
        loop {
            let current = (*receiver.borrow_and_update()).clone();
            if let Some(value) = current {
                return value;
            }
            // The sender lives in `self`, which outlives this borrow.
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl<T: Clone + Send + Sync> Default for ReadinessRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ReadinessRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.slots.lock().keys().cloned().collect();
        f.debug_struct("ReadinessRegistry")
            .field("names", &names)
            .finish()
    }
}
