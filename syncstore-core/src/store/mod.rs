//! External Stores
//!
//! This module implements the data/ownership primitive of the engine: a
//! mutable value owned by a [`Store`] together with the registry of callbacks
//! that want to hear about writes.
//!
//! # Concepts
//!
//! ## Snapshots
//!
//! State is held as an `Arc<S>`. `get()` hands out a clone of that `Arc`, so
//! readers get a stable snapshot and can never write around `set`. Every
//! write installs a fresh `Arc`, which lets downstream layers use pointer
//! identity as a cheap "did anything change" check.
//!
//! ## Listeners
//!
//! `subscribe` registers a callback and returns a [`Subscription`]. Each
//! registration is distinct, every write invokes each active listener exactly
//! once, and a listener never runs after its `unsubscribe` has returned.
//!
//! # Ownership
//!
//! There is no global store. Every store is constructed explicitly and passed
//! around by handle, so any number of independent stores can coexist.

mod listener;
mod state;

pub use listener::{ListenerId, Subscription};
pub use state::{Store, StoreId, WeakStore};
