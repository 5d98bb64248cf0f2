//! Subscription Adapter
//!
//! Bridges a [`Store`] (or a selector over it) into a host component. The
//! adapter guarantees the component re-renders if and only if its selected
//! slice changed, including writes that land between the render phase and
//! the commit phase.
//!
//! # Lifecycle
//!
//! 1. **Render**: read `selector(store.get())` and return it. No side
//!    effects, so speculative re-renders are harmless.
//!
//! 2. **Commit**: register a listener, then immediately refresh the binding
//!    once more. If the store moved on since the render-phase read, the
//!    version cell is bumped and the component re-renders. Without this step
//!    a write in that window would be lost for this subscriber.
//!
//! 3. **Subscribed**: every store notification refreshes the binding. Only a
//!    change under the equality policy bumps the version.
//!
//! 4. **Unmount**: the cleanup unsubscribes. The listener never fires again
//!    once that returns.
//!
//! Re-renders are requested by incrementing an explicit version counter
//! held in a persistent cell, so every re-render has a traceable cause.
//!
//! The subscription is re-created only when the store or the selector
//! identity changes.

use std::sync::Arc;

use smallvec::smallvec;
use tracing::{debug, trace, warn};

use crate::binding::{Binding, Equality, SameValue, Selector};
use crate::error::Result;
use crate::host::{CellSetter, Cleanup, Host};
use crate::store::Store;

/// Bind the whole store state.
///
/// Every write re-renders the component, because every write installs a new
/// snapshot.
pub fn use_store_value<H, S>(host: &mut H, store: &Store<S>) -> Result<Arc<S>>
where
    H: Host,
    S: Send + Sync + 'static,
{
    use_store_selector_with(host, store, &Selector::whole(), Equality::identity())
}

/// Bind a slice of the store state using the identity equality policy.
pub fn use_store_selector<H, S, V>(host: &mut H, store: &Store<S>, selector: &Selector<S, V>) -> Result<V>
where
    H: Host,
    S: Send + Sync + 'static,
    V: SameValue + Clone + Send + 'static,
{
    use_store_selector_with(host, store, selector, Equality::identity())
}

/// Bind a slice of the store state using an explicit equality policy.
///
/// Fails only if the store was destroyed. A panicking selector unwinds
/// through the render (or, later, through the store write that triggered
/// the notification).
pub fn use_store_selector_with<H, S, V>(
    host: &mut H,
    store: &Store<S>,
    selector: &Selector<S, V>,
    equality: Equality<V>,
) -> Result<V>
where
    H: Host,
    S: Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    let (_version, bump) = host.use_cell(|| 0u64);

    let state = store.get()?;
    let selected = selector.select(&state);

    let binding = Binding::seeded(selector.clone(), equality, state, selected.clone());
    let store = store.clone();
    host.use_after_commit(
        smallvec![store.id().raw(), selector.id().raw()],
        move || attach(store, binding, bump),
    );

    Ok(selected)
}

/// Subscribe a committed binding and close the render-to-commit window.
fn attach<S, V>(store: Store<S>, binding: Binding<S, V>, bump: CellSetter<u64>) -> Option<Cleanup>
where
    S: Send + Sync + 'static,
    V: Send + 'static,
{
    let binding = Arc::new(binding);
    let store_id = store.id();

    let listener = {
        let store = store.downgrade();
        let binding = Arc::clone(&binding);
        let bump = bump.clone();
        move || {
            let Some(state) = store.upgrade().and_then(|store| store.get().ok()) else {
                return;
            };
            if binding.refresh(&state) {
                trace!(store = %store_id, "selection changed, requesting re-render");
                bump.update(|version| version.wrapping_add(1));
            }
        }
    };

    let subscription = match store.subscribe(listener) {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(store = %store_id, error = %err, "cannot subscribe after commit");
            return None;
        }
    };
    debug!(store = %store_id, listener = ?subscription.id(), selector = ?binding.selector().id(), "subscribed");

    if let Ok(state) = store.get() {
        if binding.refresh(&state) {
            trace!(store = %store_id, "store changed between render and commit");
            bump.update(|version| version.wrapping_add(1));
        }
    }

    Some(Box::new(move || {
        subscription.unsubscribe();
        debug!(store = %store_id, listener = ?subscription.id(), "unsubscribed");
    }))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
