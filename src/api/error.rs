//! Typed errors for backend API operations
//!
//! The taxonomy keeps "reached the backend, got nonsense" (`Decode`,
//! `Validation`) distinct from "never got a useful response" (`Network`,
//! `Status`). No retries happen at this layer; surfacing the failure is
//! the caller's job.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller passed invalid parameters (empty name, zero days, ...).
    /// Detected before any I/O.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Backend answered with a non-2xx status.
    ///
    /// `message` is the backend error body's `message` (or `detail`) field
    /// when present, else the HTTP status text. Display shows the message
    /// alone so it can be surfaced to users verbatim.
    #[error("{message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the declared schema.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Response decoded but violated a structural invariant
    /// (e.g. a prediction sequence containing a Sunday).
    #[error("response validation failed: {0}")]
    Validation(String),
}

impl ApiError {
    /// Normalize a non-2xx response into `Status`, extracting the backend's
    /// human-readable message when the body carries one.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("detail"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        ApiError::Status { status, message }
    }

    pub fn from_network(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Network(format!("request timeout: {e}"))
        } else if e.is_connect() {
            ApiError::Network(format!("connection failed: {e}"))
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// True when the backend was reached but the payload shape was wrong.
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, ApiError::Decode(_) | ApiError::Validation(_))
    }

    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
