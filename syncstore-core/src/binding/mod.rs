//! Selector Binding
//!
//! Change detection lives here, not in the store. A store notifies on every
//! write; each subscriber decides through its [`Binding`] whether the slice
//! it selected actually changed, using a pluggable [`Equality`] policy.

mod equality;
mod selector;

pub use equality::{same_value, shallow_equal, Equality, SameValue, ShallowEq};
pub use selector::{Binding, Selector, SelectorId};
