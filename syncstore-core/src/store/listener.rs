//! Listener types for the store registry.
//!
//! A listener is a change callback registered with exactly one store. Each
//! registration gets its own id, so the same closure logic subscribed twice
//! is two listeners, and a single listener is never invoked twice per write.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::state::StoreInner;

/// Unique identifier for a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered change callback.
///
/// The `active` flag is cleared on unsubscribe. Notification rounds check it
/// right before invoking, so a listener removed while a round is in flight is
/// skipped by every invocation that has not started yet.
pub(crate) struct Listener {
    id: ListenerId,
    active: AtomicBool,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Listener {
    pub(crate) fn new<F>(notify: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: ListenerId::new(),
            active: AtomicBool::new(true),
            notify: Box::new(notify),
        })
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns true if this call performed the deactivation.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Invoke the callback unless the listener was removed.
    pub(crate) fn notify(&self) {
        if self.is_active() {
            (self.notify)();
        }
    }
}

/// Handle returned by `Store::subscribe`.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes exactly the
/// listener this handle was created for. It is idempotent. Dropping the
/// handle unsubscribes as well.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    listener: Arc<Listener>,
    remove: Box<dyn Fn(ListenerId) + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new<S>(listener: Arc<Listener>, store: std::sync::Weak<StoreInner<S>>) -> Self
    where
        S: Send + Sync + 'static,
    {
        Self {
            listener,
            remove: Box::new(move |id| {
                if let Some(inner) = store.upgrade() {
                    inner.remove_listener(id);
                }
            }),
        }
    }

    /// The id of the listener this handle controls.
    pub fn id(&self) -> ListenerId {
        self.listener.id()
    }

    /// Whether the listener can still be invoked.
    pub fn is_active(&self) -> bool {
        self.listener.is_active()
    }

    /// Remove the listener from its store.
    ///
    /// Once this returns the listener is never invoked again, even by a
    /// notification round that is already iterating.
    pub fn unsubscribe(&self) {
        if self.listener.deactivate() {
            (self.remove)(self.listener.id());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}
