//! Selector Bindings
//!
//! A [`Selector`] projects the full store state to the slice one subscriber
//! cares about. A [`Binding`] pairs a selector with an equality policy and
//! remembers the last selection it emitted, so it can answer "did my slice
//! change?" after every store write.
//!
//! # Re-invocation Rules
//!
//! 1. The selector runs once when the binding is created (or the binding is
//!    seeded with a selection that was already computed).
//!
//! 2. On every refresh, if the store snapshot is the same `Arc` the binding
//!    last saw, the selector is not run at all.
//!
//! 3. Otherwise the selector runs and its output is compared to the last
//!    emitted selection. Only a policy-reported difference replaces the
//!    emitted value; an equal result keeps the previous value, so callers
//!    holding it see a stable reference.
//!
//! Selectors must be pure. A panicking selector unwinds through whoever
//! triggered the refresh.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::equality::Equality;

/// Identity of a selector.
///
/// Two selectors are "the same subscription" for the binding layer only when
/// their ids match. Cloning a [`Selector`] keeps its id; constructing a new
/// one, even from identical code, does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectorId(u64);

impl SelectorId {
    /// Reserved id of [`Selector::whole`].
    pub const WHOLE: SelectorId = SelectorId(0);

    /// Generate a new unique selector ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SelectorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A pure projection from store state `S` to a derived value `V`.
pub struct Selector<S, V> {
    id: SelectorId,
    project: Arc<dyn Fn(&Arc<S>) -> V + Send + Sync>,
}

impl<S, V> Selector<S, V>
where
    S: 'static,
    V: 'static,
{
    /// Wrap a projection function.
    ///
    /// Create selectors once and clone them. A selector rebuilt on every
    /// render gets a new id each time, which makes the adapter resubscribe.
    pub fn new<F>(project: F) -> Self
    where
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        Self {
            id: SelectorId::new(),
            project: Arc::new(move |state: &Arc<S>| project(&**state)),
        }
    }

    /// Get the selector's ID.
    pub fn id(&self) -> SelectorId {
        self.id
    }

    /// Run the projection.
    #[inline]
    pub fn select(&self, state: &Arc<S>) -> V {
        (self.project)(state)
    }
}

impl<S: 'static> Selector<S, Arc<S>> {
    /// The whole-state selector. Every instance shares one id.
    pub fn whole() -> Self {
        Self {
            id: SelectorId::WHOLE,
            project: Arc::new(|state: &Arc<S>| Arc::clone(state)),
        }
    }
}

impl<S, V> Clone for Selector<S, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            project: Arc::clone(&self.project),
        }
    }
}

impl<S, V> fmt::Debug for Selector<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("id", &self.id).finish()
    }
}

/// Last emitted selection and the snapshot it was computed from.
struct Emitted<S, V> {
    state: Arc<S>,
    value: V,
}

/// A selector plus equality policy with memory of its last emitted value.
pub struct Binding<S, V> {
    selector: Selector<S, V>,
    equality: Equality<V>,
    last: Mutex<Emitted<S, V>>,
}

impl<S, V> Binding<S, V>
where
    S: 'static,
    V: 'static,
{
    /// Create a binding, running the selector once against `state`.
    pub fn new(selector: Selector<S, V>, equality: Equality<V>, state: Arc<S>) -> Self {
        let value = selector.select(&state);
        Self::seeded(selector, equality, state, value)
    }

    /// Create a binding from a selection that was already computed.
    pub fn seeded(selector: Selector<S, V>, equality: Equality<V>, state: Arc<S>, value: V) -> Self {
        Self {
            selector,
            equality,
            last: Mutex::new(Emitted { state, value }),
        }
    }

    /// The bound selector.
    pub fn selector(&self) -> &Selector<S, V> {
        &self.selector
    }

    /// The equality policy in use.
    pub fn equality(&self) -> &Equality<V> {
        &self.equality
    }

    /// The last emitted selection.
    pub fn value(&self) -> V
    where
        V: Clone,
    {
        self.last.lock().value.clone()
    }

    /// Re-evaluate against `state`.
    ///
    /// Returns `true` when the selection changed under the equality policy,
    /// in which case the new selection becomes the emitted value.
    pub fn refresh(&self, state: &Arc<S>) -> bool {
        if Arc::ptr_eq(&self.last.lock().state, state) {
            return false;
        }

        // Run user code without holding the lock.
        let next = self.selector.select(state);

        let mut last = self.last.lock();
        last.state = Arc::clone(state);
        if self.equality.equals(&last.value, &next) {
            return false;
        }
        last.value = next;
        true
    }
}

impl<S, V> fmt::Debug for Binding<S, V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("selector", &self.selector)
            .field("equality", &self.equality)
            .field("value", &self.last.lock().value)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
