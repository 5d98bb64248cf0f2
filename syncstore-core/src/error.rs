//! Error types.
//!
//! The engine has exactly one user-facing failure: touching a store after it
//! was destroyed. Everything else is either infallible or user code (selectors
//! and updaters) whose panics unwind through the caller untouched.
//! [`HarnessError`] covers misuse of the headless host runtime.

use thiserror::Error;

use crate::host::ComponentId;
use crate::store::StoreId;

/// Returned by `get`, `set`, `update` and `subscribe` on a destroyed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("store {store} has been destroyed")]
pub struct StoreDestroyedError {
    /// The store that was accessed.
    pub store: StoreId,
}

/// Misuse of the headless [`Harness`](crate::host::Harness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// The id does not name a live component.
    #[error("component {0} does not exist")]
    UnknownComponent(ComponentId),

    /// `commit` was called without a preceding `render`.
    #[error("component {0} has no rendered output to commit")]
    NothingToCommit(ComponentId),

    /// A render used a hook slot for a different type than before.
    #[error("component {0} called hooks in a different order")]
    HookOrderChanged(ComponentId),

    /// `flush` kept finding dirty components.
    #[error("flush did not settle after {passes} passes")]
    FlushDidNotSettle {
        /// Number of passes attempted.
        passes: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = StoreDestroyedError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_names_the_store() {
        let err = StoreDestroyedError { store: StoreId::from(7) };
        assert_eq!(err.to_string(), "store #7 has been destroyed");
    }

    #[test]
    fn harness_errors_render() {
        let err = HarnessError::FlushDidNotSettle { passes: 3 };
        assert_eq!(err.to_string(), "flush did not settle after 3 passes");

        let id = crate::host::Harness::new().create(None, |_| String::new()).unwrap();
        let err = HarnessError::HookOrderChanged(id);
        assert_eq!(err.to_string(), format!("component {id} called hooks in a different order"));
    }
}
