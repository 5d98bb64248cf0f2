//! Scoped Store Provider
//!
//! Lets several stores of the same shape coexist in one tree. A provider
//! component binds a store to its subtree; consumers resolve the nearest
//! enclosing provider, or fall back to a lazily created default store when
//! no provider encloses them.
//!
//! Resolution is a capability lookup through [`Host::consume`]. Nothing is
//! global: the default store belongs to the [`ScopedStore`] value, so two
//! scoped definitions never share state.

use std::fmt;
use std::sync::{Arc, OnceLock};

use smallvec::smallvec;
use tracing::debug;

use super::subscription::{use_store_selector_with, use_store_value};
use crate::binding::{Equality, SameValue, Selector};
use crate::error::Result;
use crate::host::{ContextKey, Host};
use crate::store::Store;

/// A family of stores of shape `S`, resolved by tree position.
///
/// # Example
///
/// ```rust
/// use syncstore_core::binding::Selector;
/// use syncstore_core::hooks::ScopedStore;
/// use syncstore_core::host::Harness;
///
/// let theme = ScopedStore::new(|| "light".to_string());
/// let name = Selector::new(|s: &String| s.clone());
/// let mut harness = Harness::new();
///
/// let provider_theme = theme.clone();
/// let provider = harness
///     .mount(None, move |scope| {
///         provider_theme.provide(scope, || "dark".to_string());
///         String::new()
///     })
///     .unwrap();
///
/// let consumer_theme = theme.clone();
/// let child = harness
///     .mount(Some(provider), move |scope| {
///         consumer_theme.use_scoped_with(scope, &name, Default::default()).unwrap()
///     })
///     .unwrap();
///
/// assert_eq!(harness.output(child), Some("dark"));
/// ```
pub struct ScopedStore<S> {
    key: ContextKey,
    init: Arc<dyn Fn() -> S + Send + Sync>,
    fallback: Arc<OnceLock<Store<S>>>,
}

impl<S> ScopedStore<S>
where
    S: Send + Sync + 'static,
{
    /// Define a scoped store. `init` builds the state of the default store.
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            key: ContextKey::new(),
            init: Arc::new(init),
            fallback: Arc::new(OnceLock::new()),
        }
    }

    /// The capability key providers bind under.
    pub fn key(&self) -> ContextKey {
        self.key
    }

    /// Bind a store to the calling component's subtree.
    ///
    /// Call from the provider's render function. The store is created on
    /// the provider's first render only and reused on every later render.
    /// It is destroyed when the provider unmounts.
    pub fn provide<H, F>(&self, host: &mut H, initial: F) -> Store<S>
    where
        H: Host,
        F: FnOnce() -> S,
    {
        let (store, _) = host.use_cell(|| {
            let store = Store::new(initial());
            debug!(store = %store.id(), "scoped store created for provider");
            store
        });

        host.provide(self.key, store.clone());

        let owned = store.clone();
        host.use_after_commit(smallvec![store.id().raw()], move || {
            Some(Box::new(move || owned.destroy()))
        });

        store
    }

    /// Like [`provide`](ScopedStore::provide), seeded from the definition's
    /// initializer.
    pub fn provide_default<H>(&self, host: &mut H) -> Store<S>
    where
        H: Host,
    {
        let init = Arc::clone(&self.init);
        self.provide(host, move || init())
    }

    /// The store of the nearest enclosing provider, or the default store.
    pub fn resolve<H>(&self, host: &H) -> Store<S>
    where
        H: Host,
    {
        host.consume::<Store<S>>(self.key)
            .unwrap_or_else(|| self.default_store())
    }

    /// The store used outside of any provider, created on first use.
    pub fn default_store(&self) -> Store<S> {
        self.fallback
            .get_or_init(|| {
                let store = Store::new((self.init)());
                debug!(store = %store.id(), "default scoped store created");
                store
            })
            .clone()
    }

    /// Bind the whole state of the resolved store.
    pub fn use_scoped_value<H>(&self, host: &mut H) -> Result<Arc<S>>
    where
        H: Host,
    {
        let store = self.resolve(host);
        use_store_value(host, &store)
    }

    /// Bind a slice of the resolved store with the identity policy.
    pub fn use_scoped<H, V>(&self, host: &mut H, selector: &Selector<S, V>) -> Result<V>
    where
        H: Host,
        V: SameValue + Clone + Send + 'static,
    {
        self.use_scoped_with(host, selector, Equality::identity())
    }

    /// Bind a slice of the resolved store with an explicit policy.
    pub fn use_scoped_with<H, V>(
        &self,
        host: &mut H,
        selector: &Selector<S, V>,
        equality: Equality<V>,
    ) -> Result<V>
    where
        H: Host,
        V: Clone + Send + 'static,
    {
        let store = self.resolve(host);
        use_store_selector_with(host, &store, selector, equality)
    }
}

impl<S> Default for ScopedStore<S>
where
    S: Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(S::default)
    }
}

impl<S> Clone for ScopedStore<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            init: Arc::clone(&self.init),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<S> fmt::Debug for ScopedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore")
            .field("key", &self.key)
            .field("default_created", &self.fallback.get().is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Harness, RenderScope};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn count_reader(
        scoped: &ScopedStore<i32>,
    ) -> impl FnMut(&mut RenderScope<'_>) -> String + 'static {
        let scoped = scoped.clone();
        let selector = Selector::new(|n: &i32| *n);
        move |scope| scoped.use_scoped(scope, &selector).unwrap().to_string()
    }

    #[test]
    fn consumer_without_provider_uses_default_store() {
        let scoped = ScopedStore::new(|| 5);
        let mut harness = Harness::new();

        let id = harness.mount(None, count_reader(&scoped)).unwrap();
        assert_eq!(harness.output(id), Some("5"));

        scoped.default_store().set(6).unwrap();
        harness.flush().unwrap();
        assert_eq!(harness.output(id), Some("6"));
    }

    #[test]
    fn default_store_is_created_once() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let scoped = ScopedStore::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            0
        });

        let a = scoped.default_store();
        let b = scoped.clone().default_store();
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn providers_isolate_subtrees() {
        let scoped = ScopedStore::<i32>::default();
        let stores: Arc<Mutex<Vec<Store<i32>>>> = Arc::new(Mutex::new(Vec::new()));
        let mut harness = Harness::new();

        let mut providers = Vec::new();
        for initial in [10, 20] {
            let scoped = scoped.clone();
            let stores = stores.clone();
            let provider = harness
                .mount(None, move |scope| {
                    let store = scoped.provide(scope, || initial);
                    if scope.previous_renders() == 0 {
                        stores.lock().push(store);
                    }
                    String::new()
                })
                .unwrap();
            providers.push(provider);
        }

        let left = harness.mount(Some(providers[0]), count_reader(&scoped)).unwrap();
        let right = harness.mount(Some(providers[1]), count_reader(&scoped)).unwrap();
        assert_eq!(harness.output(left), Some("10"));
        assert_eq!(harness.output(right), Some("20"));

        stores.lock()[0].set(11).unwrap();
        harness.flush().unwrap();
        assert_eq!(harness.output(left), Some("11"));
        assert_eq!(harness.output(right), Some("20"));
        assert_eq!(harness.render_count(right), Some(1));
    }

    #[test]
    fn provider_creates_store_once_per_mount() {
        let scoped = ScopedStore::new(|| 0);
        let created = Arc::new(AtomicI32::new(0));
        let seen: Arc<Mutex<Vec<Store<i32>>>> = Arc::new(Mutex::new(Vec::new()));
        let mut harness = Harness::new();

        let provider_scoped = scoped.clone();
        let provider_created = created.clone();
        let provider_seen = seen.clone();
        let provider = harness
            .create(None, move |scope| {
                let counter = provider_created.clone();
                let store = provider_scoped.provide(scope, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    1
                });
                provider_seen.lock().push(store);
                String::new()
            })
            .unwrap();

        for _ in 0..3 {
            harness.render(provider).unwrap();
            harness.commit(provider).unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|store| store.ptr_eq(&seen[0])));
    }

    #[test]
    fn nearest_provider_wins() {
        let scoped = ScopedStore::new(|| 0);
        let mut harness = Harness::new();

        let outer_scoped = scoped.clone();
        let outer = harness
            .mount(None, move |scope| {
                outer_scoped.provide(scope, || 1);
                String::new()
            })
            .unwrap();
        let inner_scoped = scoped.clone();
        let inner = harness
            .mount(Some(outer), move |scope| {
                inner_scoped.provide(scope, || 2);
                String::new()
            })
            .unwrap();

        let direct = harness.mount(Some(outer), count_reader(&scoped)).unwrap();
        let nested = harness.mount(Some(inner), count_reader(&scoped)).unwrap();

        assert_eq!(harness.output(direct), Some("1"));
        assert_eq!(harness.output(nested), Some("2"));
    }

    #[test]
    fn provider_unmount_destroys_its_store() {
        let scoped = ScopedStore::new(|| 0);
        let slot: Arc<Mutex<Option<Store<i32>>>> = Arc::new(Mutex::new(None));
        let mut harness = Harness::new();

        let provider_scoped = scoped.clone();
        let provider_slot = slot.clone();
        let provider = harness
            .mount(None, move |scope| {
                let store = provider_scoped.provide_default(scope);
                *provider_slot.lock() = Some(store);
                String::new()
            })
            .unwrap();
        harness.mount(Some(provider), count_reader(&scoped)).unwrap();

        let store = slot.lock().clone().unwrap();
        assert_eq!(store.listener_count(), 1);

        harness.unmount(provider).unwrap();
        assert!(store.is_destroyed());
        assert!(!scoped.default_store().is_destroyed());
    }

    #[test]
    fn whole_value_binding_through_scope() {
        let scoped = ScopedStore::new(|| vec![1, 2, 3]);
        let mut harness = Harness::new();

        let reader = scoped.clone();
        let id = harness
            .mount(None, move |scope| {
                let items = reader.use_scoped_value(scope).unwrap();
                items.len().to_string()
            })
            .unwrap();
        assert_eq!(harness.output(id), Some("3"));

        scoped.default_store().update(|v| {
            let mut next = v.clone();
            next.push(4);
            next
        })
        .unwrap();
        harness.flush().unwrap();
        assert_eq!(harness.output(id), Some("4"));
    }
}
