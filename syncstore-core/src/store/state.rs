//! Store Implementation
//!
//! A `Store` owns one piece of shared state and the registry of callbacks
//! interested in it. It knows nothing about rendering.
//!
//! # Write Path
//!
//! 1. The next state is computed (from a value or an updater run against the
//!    current snapshot).
//!
//! 2. The held `Arc` is swapped under the write lock. The lock is released
//!    before anything else runs.
//!
//! 3. The listener registry is snapshotted and every active listener is
//!    invoked once, synchronously. A listener that calls `get()` observes the
//!    state written in step 2.
//!
//! The store always replaces and always notifies, even when the next state is
//! the same `Arc` as the current one. Deciding whether anything "really"
//! changed belongs to the selector binding layer.
//!
//! # Re-entrancy
//!
//! No lock is held while user code (updaters, listeners) runs, so a listener
//! may call `set` on the same store. The nested write completes its own
//! notification round before the outer round resumes.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::listener::{Listener, ListenerId, Subscription};
use crate::config::StoreConfig;
use crate::error::{Result, StoreDestroyedError};

/// Unique identifier for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    /// Generate a new unique store ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for StoreId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared state behind every `Store` handle.
pub(crate) struct StoreInner<S> {
    id: StoreId,
    config: StoreConfig,
    state: RwLock<Arc<S>>,
    listeners: RwLock<IndexMap<ListenerId, Arc<Listener>>>,
    destroyed: AtomicBool,
    over_threshold: AtomicBool,
}

impl<S> StoreInner<S> {
    pub(crate) fn remove_listener(&self, id: ListenerId) {
        let remaining = {
            let mut listeners = self.listeners.write();
            listeners.swap_remove(&id);
            listeners.len()
        };

        if let Some(threshold) = self.config.listener_warning_threshold {
            if remaining <= threshold {
                self.over_threshold.store(false, Ordering::Relaxed);
            }
        }
    }
}

/// An externally owned value plus the callbacks that watch it.
///
/// `Store` is a cheap handle: clones share the same state and registry.
/// Callers receive snapshots (`Arc<S>`) and can only change the state through
/// [`set`](Store::set), [`update`](Store::update) or
/// [`replace`](Store::replace).
///
/// # Example
///
/// ```rust
/// use syncstore_core::store::Store;
///
/// let store = Store::new(0);
/// let _sub = store.subscribe(|| println!("changed")).unwrap();
///
/// store.update(|n| n + 1).unwrap();
/// assert_eq!(*store.get().unwrap(), 1);
/// ```
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Store<S>
where
    S: Send + Sync + 'static,
{
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a store whose initial state is produced by `init`.
    pub fn new_with<F>(init: F) -> Self
    where
        F: FnOnce() -> S,
    {
        Self::new(init())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(initial: S, config: StoreConfig) -> Self {
        let id = StoreId::new();
        debug!(store = %id, label = config.label.as_deref(), "store created");

        Self {
            inner: Arc::new(StoreInner {
                id,
                config,
                state: RwLock::new(Arc::new(initial)),
                listeners: RwLock::new(IndexMap::new()),
                destroyed: AtomicBool::new(false),
                over_threshold: AtomicBool::new(false),
            }),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Get the configured label, if any.
    pub fn label(&self) -> Option<&str> {
        self.inner.config.label.as_deref()
    }

    /// Get the current state snapshot.
    ///
    /// Always reflects the most recently completed write.
    pub fn get(&self) -> Result<Arc<S>> {
        self.ensure_alive()?;
        Ok(Arc::clone(&self.inner.state.read()))
    }

    /// Replace the state with `value` and notify every listener.
    ///
    /// Returns the new snapshot.
    pub fn set(&self, value: S) -> Result<Arc<S>> {
        self.replace(Arc::new(value))
    }

    /// Compute the next state from the current one and notify every listener.
    ///
    /// The updater runs without any lock held. If it panics, the state is
    /// left untouched and the panic propagates to the caller.
    pub fn update<F>(&self, f: F) -> Result<Arc<S>>
    where
        F: FnOnce(&S) -> S,
    {
        let current = self.get()?;
        let next = f(&*current);
        self.replace(Arc::new(next))
    }

    /// Install an existing snapshot as the state and notify every listener.
    ///
    /// Notification happens even when `next` is the current snapshot.
    pub fn replace(&self, next: Arc<S>) -> Result<Arc<S>> {
        self.ensure_alive()?;

        {
            let mut state = self.inner.state.write();
            *state = Arc::clone(&next);
        }

        self.notify();
        Ok(next)
    }

    /// Register `callback` to run after every write.
    ///
    /// The returned handle removes exactly this registration.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);

        let count = {
            let mut listeners = self.inner.listeners.write();
            // Checked under the registry lock so destroy() cannot race an insert.
            self.ensure_alive()?;
            listeners.insert(listener.id(), Arc::clone(&listener));
            listeners.len()
        };

        self.check_listener_threshold(count);

        Ok(Subscription::new(listener, Arc::downgrade(&self.inner)))
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Tear the store down.
    ///
    /// Every listener is removed and deactivated. Further `get`, `set`,
    /// `update` and `subscribe` calls fail with [`StoreDestroyedError`].
    /// Calling `destroy` again is a no-op.
    pub fn destroy(&self) {
        let drained: Vec<Arc<Listener>> = {
            let mut listeners = self.inner.listeners.write();
            if self.inner.destroyed.swap(true, Ordering::SeqCst) {
                return;
            }
            listeners.drain(..).map(|(_, listener)| listener).collect()
        };

        for listener in &drained {
            listener.deactivate();
        }

        debug!(
            store = %self.inner.id,
            label = self.label(),
            listeners = drained.len(),
            "store destroyed"
        );
    }

    /// Whether [`destroy`](Store::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Create a weak handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(StoreDestroyedError {
                store: self.inner.id,
            });
        }
        Ok(())
    }

    /// Invoke every active listener once.
    fn notify(&self) {
        let snapshot: SmallVec<[Arc<Listener>; 8]> =
            self.inner.listeners.read().values().cloned().collect();

        trace!(store = %self.inner.id, listeners = snapshot.len(), "notifying listeners");

        for listener in snapshot {
            listener.notify();
        }
    }

    fn check_listener_threshold(&self, count: usize) {
        let Some(threshold) = self.inner.config.listener_warning_threshold else {
            return;
        };

        if count > threshold && !self.inner.over_threshold.swap(true, Ordering::Relaxed) {
            warn!(
                store = %self.inner.id,
                label = self.label(),
                listeners = count,
                threshold,
                "listener count exceeds threshold, possible subscription leak"
            );
        }
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> PartialEq for Store<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Eq for Store<S> {}

impl<S> fmt::Debug for Store<S>
where
    S: Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("label", &self.label())
            .field("state", &*self.inner.state.read())
            .field("listener_count", &self.listener_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Weak counterpart of [`Store`].
pub struct WeakStore<S> {
    inner: Weak<StoreInner<S>>,
}

impl<S> WeakStore<S> {
    /// Recover a strong handle if the store still exists.
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        (count, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn store_get_and_set() {
        let store = Store::new(0);
        assert_eq!(*store.get().unwrap(), 0);

        let next = store.set(42).unwrap();
        assert_eq!(*next, 42);
        assert_eq!(*store.get().unwrap(), 42);
    }

    #[test]
    fn store_update_uses_current_state() {
        let store = Store::new(10);
        store.update(|v| v + 5).unwrap();
        store.update(|v| v * 2).unwrap();
        assert_eq!(*store.get().unwrap(), 30);
    }

    #[test]
    fn store_new_with_runs_initializer_once() {
        let (calls, bump) = counter();
        let store = Store::new_with(|| {
            bump();
            "ready"
        });
        assert_eq!(*store.get().unwrap(), "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn store_notifies_each_listener_once_per_write() {
        let store = Store::new(0);
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        let _a = store.subscribe(first_cb).unwrap();
        let _b = store.subscribe(second_cb).unwrap();

        store.set(1).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        store.set(2).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn store_notifies_even_when_snapshot_is_identical() {
        let store = Store::new(5);
        let (calls, cb) = counter();
        let _sub = store.subscribe(cb).unwrap();

        let current = store.get().unwrap();
        store.replace(current.clone()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&current, &store.get().unwrap()));
    }

    #[test]
    fn listener_observes_written_state() {
        let store = Store::new(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let seen_clone = seen.clone();
        let reader = store.clone();
        let _sub = store
            .subscribe(move || {
                seen_clone.store(*reader.get().unwrap(), Ordering::SeqCst);
            })
            .unwrap();

        store.set(9).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_silences_listener() {
        let store = Store::new(0);
        let (calls, cb) = counter();
        let sub = store.subscribe(cb).unwrap();

        store.set(1).unwrap();
        sub.unsubscribe();
        sub.unsubscribe();
        store.set(2).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = Store::new(0);
        let (calls, cb) = counter();

        {
            let _sub = store.subscribe(cb).unwrap();
            assert_eq!(store.listener_count(), 1);
        }

        store.set(1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn set_from_inside_listener_does_not_deadlock() {
        let store = Store::new(0);
        let (calls, _) = counter();

        let writer = store.clone();
        let calls_clone = calls.clone();
        let _sub = store
            .subscribe(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                let current = *writer.get().unwrap();
                if current < 3 {
                    writer.set(current + 1).unwrap();
                }
            })
            .unwrap();

        store.set(1).unwrap();
        assert_eq!(*store.get().unwrap(), 3);
        // One round per write: 1, 2 and 3.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listener_removed_mid_round_is_skipped() {
        let store = Store::new(0);
        let (late_calls, late_cb) = counter();

        let late = Arc::new(parking_lot::Mutex::new(None::<Subscription>));
        let late_clone = late.clone();
        let _early = store
            .subscribe(move || {
                if let Some(sub) = late_clone.lock().as_ref() {
                    sub.unsubscribe();
                }
            })
            .unwrap();
        *late.lock() = Some(store.subscribe(late_cb).unwrap());

        store.set(1).unwrap();
        store.set(2).unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn destroyed_store_rejects_every_operation() {
        let store = Store::new(1);
        let (calls, cb) = counter();
        let sub = store.subscribe(cb).unwrap();

        store.destroy();
        store.destroy();

        let expected = StoreDestroyedError { store: store.id() };
        assert_eq!(store.get().unwrap_err(), expected);
        assert_eq!(store.set(2).unwrap_err(), expected);
        assert_eq!(store.update(|v| v + 1).unwrap_err(), expected);
        assert_eq!(store.subscribe(|| {}).unwrap_err(), expected);

        assert!(store.is_destroyed());
        assert!(!sub.is_active());
        assert_eq!(store.listener_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Unsubscribing after destruction is a no-op.
        sub.unsubscribe();
    }

    #[test]
    fn panicking_updater_leaves_state_untouched() {
        let store = Store::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.update(|_| panic!("updater failed"));
        }));

        assert!(result.is_err());
        assert_eq!(*store.get().unwrap(), 1);
        store.set(2).unwrap();
        assert_eq!(*store.get().unwrap(), 2);
    }

    #[test]
    fn clones_share_state_and_weak_handles_upgrade() {
        let store1 = Store::new(0);
        let store2 = store1.clone();
        let weak = store1.downgrade();

        store1.set(42).unwrap();
        assert_eq!(*store2.get().unwrap(), 42);
        assert_eq!(store1, store2);
        assert!(weak.upgrade().unwrap().ptr_eq(&store1));

        drop(store1);
        drop(store2);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn store_ids_and_labels() {
        let s1 = Store::new(0);
        let s2 = Store::with_config(0, StoreConfig::labeled("cart"));

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s1, s2);
        assert_eq!(s1.label(), None);
        assert_eq!(s2.label(), Some("cart"));
    }

    #[test]
    fn threshold_flag_resets_when_listeners_drop() {
        let store = Store::with_config(
            0,
            StoreConfig::default().with_listener_warning_threshold(Some(1)),
        );

        let a = store.subscribe(|| {}).unwrap();
        let b = store.subscribe(|| {}).unwrap();
        assert!(store.inner.over_threshold.load(Ordering::Relaxed));

        drop(b);
        assert!(!store.inner.over_threshold.load(Ordering::Relaxed));
        drop(a);
    }
}
