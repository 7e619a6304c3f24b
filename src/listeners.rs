//! Listener Registry
//!
//! Per-kind event fan-out over crossbeam channels. Remote tables and host
//! grids push events into every registered sender; consumers drain their
//! own receiver on their own schedule.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

/// Handle returned when registering a listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Registry of channel listeners keyed by event kind
pub struct ListenerRegistry<K, E> {
    next_id: AtomicU64,
    listeners: Mutex<AHashMap<ListenerId, (K, Sender<E>)>>,
}

impl<K, E> ListenerRegistry<K, E>
where
    K: Copy + PartialEq,
    E: Clone,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(AHashMap::new()),
        }
    }

    /// Register a sender for one event kind
    pub fn add(&self, kind: K, tx: Sender<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().insert(id, (kind, tx));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Send an event to every listener of `kind`.
    ///
    /// Listeners whose receiver has been dropped are pruned. Returns the
    /// number of listeners the event was delivered to.
    pub fn emit(&self, kind: K, event: &E) -> usize {
        let mut listeners = self.listeners.lock();
        let mut delivered = 0;
        listeners.retain(|_, (listener_kind, tx)| {
            if *listener_kind != kind {
                return true;
            }
            match tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Check if no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered listeners for one kind
    pub fn count(&self, kind: K) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|(listener_kind, _)| *listener_kind == kind)
            .count()
    }
}

impl<K, E> Default for ListenerRegistry<K, E>
where
    K: Copy + PartialEq,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
