//! Component Bindings
//!
//! Hooks that connect stores to host components: the subscription adapter
//! (whole-state and selector bindings) and the scoped store provider.

mod scoped;
mod subscription;

pub use scoped::ScopedStore;
pub use subscription::{use_store_selector, use_store_selector_with, use_store_value};
