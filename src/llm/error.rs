//! Typed errors for LLM operations
//!
//! Provides structured error types to enable intelligent handling of common
//! failure modes (auth missing, rate limiting, etc.) without string matching.

use thiserror::Error;

/// LLM operation errors with typed variants
///
/// Enables callers to distinguish between different failure modes:
/// - `MissingApiKey` - no credentials configured; surfaced at request time
/// - `Unauthorized` (401) - key rejected
/// - `RateLimited` (429) - quota exceeded; can retry after delay
/// - `BadRequest` (400) - malformed request; caller error
/// - `ServiceError` (5xx) - server-side issue; can retry
/// - `Network` - connection/timeout; can retry
/// - `Interrupted` - the caller cancelled the stream
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key available in the environment
    #[error("ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,

    /// Authentication key is invalid (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Network connectivity issue (connection refused, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// The provider returned something the client could not parse
    #[error("Malformed provider response: {0}")]
    Decode(String),

    /// The stream was cancelled via the interrupt check
    #[error("interrupted")]
    Interrupted,

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Check if this error is retryable (after a delay)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::ServiceError(_) | LlmError::Network(_)
        )
    }

    /// Convert HTTP status code and error text into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 => LlmError::Unauthorized(error_text),
            429 => LlmError::RateLimited(error_text),
            400 => LlmError::BadRequest(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into a typed error
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            LlmError::Other(e.into())
        }
    }
}
