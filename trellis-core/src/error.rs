//! Error and diagnostic types.
//!
//! Nothing in the engine halts on bad input. Low-level operations that can
//! refuse a request return [`ObserveError`]; misuse of the mutation helpers
//! is reported as a [`Warning`] and otherwise ignored.

use thiserror::Error;

/// Failures of fallible low-level operations.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("Cannot redefine non-configurable property '{key}'")]
    NonConfigurable { key: String },

    #[error("Cannot add property '{key}': object is not extensible")]
    NotExtensible { key: String },

    #[error("Array length {len} is out of range")]
    ArrayLength { len: usize },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Development-time diagnostics. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("Cannot set reactive property on undefined, null, or primitive value: {target}")]
    InvalidSetTarget { target: String },

    #[error("Cannot delete reactive property on undefined, null, or primitive value: {target}")]
    InvalidDeleteTarget { target: String },

    #[error(
        "Avoid adding reactive properties to a root instance or its root data \
         at runtime - declare '{key}' upfront instead."
    )]
    RootPropertyAdd { key: String },

    #[error("Avoid deleting properties on a root instance or its root data - just set '{key}' to null.")]
    RootPropertyDelete { key: String },

    #[error("Arrays only accept index keys, got '{key}'")]
    InvalidArrayKey { key: String },
}
