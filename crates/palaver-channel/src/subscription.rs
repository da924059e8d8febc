//! Inbound frame subscriptions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;

/// Identifies one subscription on a [`crate::ChannelClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Live subscribers, keyed in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    senders: BTreeMap<SubscriptionId, mpsc::UnboundedSender<String>>,
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

pub(crate) fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub(crate) fn register(registry: &SharedRegistry) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = lock(registry);
        guard.next_id += 1;
        let id = SubscriptionId(guard.next_id);
        guard.senders.insert(id, tx);
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(registry),
        }
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }

    /// Hand `text` to every subscriber, pruning any whose receiver is gone.
    pub(crate) fn dispatch(&mut self, text: &str) {
        self.senders
            .retain(|_, tx| tx.send(text.to_owned()).is_ok());
    }
}

/// Receives every inbound text frame from the moment it is created.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<String>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next inbound frame.
    ///
    /// Returns `None` once the subscription has been removed from its client.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Take an already-delivered frame without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving frames.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
