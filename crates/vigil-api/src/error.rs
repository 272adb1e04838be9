//! Error types for the remote operation client.

use thiserror::Error;

/// Errors that can occur when calling the network service.
///
/// All of these are transient from the scheduler's point of view: they are
/// retried up to the operation's attempt budget and then surfaced as
/// [`crate::JobResult::Transient`]. Credential expiry and forbidden
/// responses are not errors here; they are their own `JobResult` variants.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport failed (connect, timeout, TLS, proxy tunnel).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON or did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status that is not a terminal classification.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response envelope reported a logical failure.
    #[error("unsuccessful response (code {code:?}): {msg}")]
    Unsuccessful { code: Option<i64>, msg: String },

    /// The proxy URI could not be used to build a client.
    #[error("invalid proxy {proxy}: {reason}")]
    Proxy { proxy: String, reason: String },

    /// Attempt budget exhausted without any attempt producing a cause.
    #[error("retry budget exhausted")]
    RetriesExhausted,
}
