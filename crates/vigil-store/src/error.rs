//! Error types for the state store.

use thiserror::Error;

/// Errors that can occur reading or writing durable state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State document could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
