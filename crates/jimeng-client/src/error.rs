//! Error types for the client library.

use std::time::Duration;

use thiserror::Error;

use jimeng_common::GenerationStatus;

/// Errors that can occur when interacting with the generation API.
///
/// This enum covers all failure classes from credential problems through
/// transport failures to task-level outcomes. None of them trigger an
/// internal retry; retry policy belongs to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Invalid credential input.
    ///
    /// Raised at client construction; signing itself cannot fail once the
    /// credentials have been accepted.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Network or HTTP transport failure.
    ///
    /// Indicates issues like DNS resolution, connection failures, or
    /// request timeouts.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    ///
    /// Occurs when a request body cannot be encoded or a response body
    /// cannot be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-2xx HTTP response from the API.
    ///
    /// Carries the raw response body for diagnosis. [`Self::is_retryable`]
    /// is advisory for `429` and `500`; the client itself never retries.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
        /// Raw response body text.
        body: String,
    },

    /// The task reached a terminal status other than `done`.
    #[error("Task failed with status `{status}`")]
    TaskFailed {
        /// The terminal status reported by the server.
        status: GenerationStatus,
    },

    /// The local deadline elapsed before the task reached a terminal
    /// status.
    #[error("Task {task_id} still pending after {waited:?}")]
    TaskTimeout {
        /// Identifier of the task that was being polled.
        task_id: String,
        /// Total time spent polling before giving up.
        waited: Duration,
    },

    /// A generation operation was attempted while another one was in
    /// flight (reject policy only).
    #[error("Another generation operation is already in flight")]
    Busy,

    /// Malformed request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected or malformed API response.
    ///
    /// Covers 2xx responses whose envelope carries no payload, such as
    /// content-policy rejections reported through the body `code`.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Check if a retry of the failed call is advisable.
    ///
    /// Returns `true` for rate limiting (`429`) and transient server
    /// errors (`500`). Advisory only: the client performs no automatic
    /// retry, callers decide.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { status: 429 | 500, .. })
    }

    /// Check if this is the reject-policy busy error.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Check if this failure came from the task itself rather than the
    /// transport.
    #[must_use]
    pub const fn is_task_failure(&self) -> bool {
        matches!(self, Self::TaskFailed { .. } | Self::TaskTimeout { .. })
    }
}
