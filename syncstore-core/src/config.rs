//! Store configuration.
//!
//! `StoreConfig` is plain data so embedders can load it from whatever format
//! they already use for settings. Missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

/// Listener count above which a store logs a possible subscription leak.
pub const DEFAULT_LISTENER_WARNING_THRESHOLD: usize = 256;

/// Per-store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Human-readable name attached to log events and `Debug` output.
    pub label: Option<String>,

    /// Warn when the number of listeners grows past this value.
    ///
    /// `None` disables the check.
    pub listener_warning_threshold: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: None,
            listener_warning_threshold: Some(DEFAULT_LISTENER_WARNING_THRESHOLD),
        }
    }
}

impl StoreConfig {
    /// Config with the given label and default limits.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Set the listener warning threshold.
    pub fn with_listener_warning_threshold(mut self, threshold: Option<usize>) -> Self {
        self.listener_warning_threshold = threshold;
        self
    }
}
