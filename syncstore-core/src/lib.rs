//! SyncStore Core
//!
//! This crate provides an external-store subscription engine: shared mutable
//! state that lives outside a reactive component tree, kept in sync with it
//! without tearing, stale reads, or redundant re-renders.
//!
//! It implements:
//!
//! - Stores holding snapshot state and a listener registry
//! - Pluggable equality policies (identity and shallow)
//! - Selector bindings with memoized re-invocation
//! - A subscription adapter for host component runtimes
//! - Scoped stores resolved by nearest enclosing provider
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: State ownership and change notification
//! - `binding`: Selectors, equality policies and change detection
//! - `host`: The boundary to the rendering runtime, plus a headless harness
//! - `hooks`: Component-facing bindings and scoped providers
//!
//! A write flows leaf-first: `Store::set` swaps the snapshot and invokes
//! every listener; each adapter's binding re-runs its selector and, only when
//! the policy reports a change, bumps a version cell in its component, which
//! schedules exactly one re-render.
//!
//! # Example
//!
//! ```rust
//! use syncstore_core::binding::Selector;
//! use syncstore_core::hooks::use_store_selector;
//! use syncstore_core::host::Harness;
//! use syncstore_core::store::Store;
//!
//! #[derive(Clone)]
//! struct Cart {
//!     items: u32,
//! }
//!
//! let store = Store::new(Cart { items: 0 });
//! let items = Selector::new(|cart: &Cart| cart.items);
//!
//! let mut harness = Harness::new();
//! let badge = {
//!     let store = store.clone();
//!     harness
//!         .mount(None, move |scope| {
//!             let count = use_store_selector(scope, &store, &items).unwrap();
//!             format!("{count} items")
//!         })
//!         .unwrap()
//! };
//!
//! store.update(|cart| Cart { items: cart.items + 1 }).unwrap();
//! harness.flush().unwrap();
//! assert_eq!(harness.output(badge), Some("1 items"));
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod hooks;
pub mod host;
pub mod store;

pub use binding::{Equality, Selector};
pub use config::StoreConfig;
pub use error::{HarnessError, Result, StoreDestroyedError};
pub use hooks::{use_store_selector, use_store_selector_with, use_store_value, ScopedStore};
pub use host::{Harness, Host};
pub use store::{Store, Subscription};
