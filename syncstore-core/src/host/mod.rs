//! Host Runtime Boundary
//!
//! The engine does not render anything. It relies on a host runtime that
//! owns a tree of components, each re-evaluating a render function and
//! committing the result. From that runtime the engine needs exactly:
//!
//! - a per-component persistent cell whose setter schedules one re-render of
//!   the owner when the value changes ([`Host::use_cell`]);
//! - a hook that runs a side effect after commit, re-runs it only when its
//!   dependency keys change, and calls the cleanup it returned before the
//!   next run and on unmount ([`Host::use_after_commit`]);
//! - nearest-ancestor capability lookup for scoped stores
//!   ([`Host::provide`] / [`Host::consume`]).
//!
//! Hooks are identified by call order, so a render function must call them
//! in the same order on every render.
//!
//! [`Harness`] is a headless implementation with explicit render and commit
//! phases. It is what the crate's own tests run against.

mod cell;
mod harness;

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

pub use cell::CellSetter;
pub use harness::{ComponentId, Harness, RenderScope, MAX_FLUSH_PASSES};

/// Dependency keys for [`Host::use_after_commit`], compared by value.
pub type Deps = SmallVec<[u64; 4]>;

/// Cleanup returned by an after-commit effect.
pub type Cleanup = Box<dyn FnOnce()>;

/// Key for nearest-ancestor capability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Generate a new unique context key.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::new()
    }
}

/// The render-time interface a host runtime offers to one component.
pub trait Host {
    /// Allocate (first render) or recall (later renders) a persistent cell.
    ///
    /// `init` runs only on the first render of the component.
    fn use_cell<T, F>(&mut self, init: F) -> (T, CellSetter<T>)
    where
        T: Clone + PartialEq + Send + 'static,
        F: FnOnce() -> T;

    /// Run `effect` after this render commits, if `deps` differ from the
    /// deps of the last committed run of this hook.
    fn use_after_commit<F>(&mut self, deps: Deps, effect: F)
    where
        F: FnOnce() -> Option<Cleanup> + 'static;

    /// Bind `value` under `key` for this component's descendants.
    fn provide<T>(&mut self, key: ContextKey, value: T)
    where
        T: Clone + Send + Sync + 'static;

    /// Find the value bound under `key` by the nearest ancestor.
    fn consume<T>(&self, key: ContextKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static;
}
