//! Persistent state cells.
//!
//! A cell is per-component memory that survives re-renders. Its setter can be
//! called from anywhere (store listeners included) and schedules a re-render
//! of the owning component only when the written value differs.

use std::fmt;
use std::sync::Arc;

/// Write side of a persistent cell.
///
/// Hosts construct it from a function that applies an update closure to the
/// cell's current value and schedules a re-render if the result differs.
pub struct CellSetter<T> {
    apply: Arc<dyn Fn(&dyn Fn(&T) -> T) + Send + Sync>,
}

impl<T> CellSetter<T> {
    /// Build a setter from the host's apply function.
    pub fn new<F>(apply: F) -> Self
    where
        F: Fn(&dyn Fn(&T) -> T) + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(apply),
        }
    }

    /// Replace the cell value.
    pub fn set(&self, value: T)
    where
        T: Clone,
    {
        (self.apply)(&|_: &T| value.clone());
    }

    /// Compute the next value from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&T) -> T,
    {
        (self.apply)(&f);
    }
}

impl<T> Clone for CellSetter<T> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<T> fmt::Debug for CellSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellSetter").finish_non_exhaustive()
    }
}
