//! Callback registration and fan-out.
//!
//! Components expose their events as `on_*` methods that register a callback
//! on an [`Emitter`] and hand back a [`Subscription`] token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ListenerList<T> = Mutex<Vec<(u64, Callback<T>)>>;

/// A multi-listener callback registry.
///
/// Emission snapshots the listener list before invoking, so callbacks are free
/// to subscribe or unsubscribe re-entrantly without deadlocking.
pub struct Emitter<T> {
    listeners: Arc<ListenerList<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback, returning a token that unregisters it when dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, Arc::new(callback)));

        let listeners: Weak<ListenerList<T>> = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    listeners
                        .lock()
                        .unwrap()
                        .retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Invoke every registered callback with `event`, in registration order.
    pub fn emit(&self, event: &T) {
        // Snapshot under the lock, invoke outside it.
        let callbacks: Vec<Callback<T>> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe token returned by [`Emitter::subscribe`].
///
/// The callback stays registered until this token is dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Unregister the callback now. Equivalent to dropping the token.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
