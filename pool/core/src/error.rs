//! Error Types
//!
//! Failure taxonomy for the pool. Every provider failure is a
//! [`ProviderError`]; the kinds are kept distinct so they show up separately
//! in a provider's `last_error`, but the pool treats them all the same way:
//! the attempt is over and the next eligible provider gets a turn.
//!
//! [`PoolError::Exhausted`] is the only error a caller of
//! [`ProviderPool::generate`](crate::ProviderPool::generate) ever sees.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Upper bound on how much of an error response body is kept
const MAX_ERROR_BODY_CHARS: usize = 1024;

// =============================================================================
// Provider Errors
// =============================================================================

/// Discriminant of a [`ProviderError`], used as a structured log field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Connection failed before any response arrived
    Network,
    /// The attempt exceeded its time budget
    Timeout,
    /// Non-2xx response
    HttpStatus,
    /// 2xx response without usable text
    EmptyResponse,
    /// Response body had an unexpected shape
    Parse,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::HttpStatus => write!(f, "http_status"),
            Self::EmptyResponse => write!(f, "empty_response"),
            Self::Parse => write!(f, "parse"),
        }
    }
}

/// Outcome of a single failed provider attempt
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connect or transport failure before a response was received
    #[error("network error: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// The attempt did not finish within the per-attempt timeout
    #[error("request timed out after {after_ms}ms")]
    Timeout {
        /// Timeout that was exceeded, in milliseconds
        after_ms: u64,
    },

    /// The backend answered with a non-2xx status
    #[error("HTTP {code}: {body}")]
    HttpStatus {
        /// HTTP status code
        code: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The backend answered 2xx but the reply carried no text
    #[error("empty response: reply contained no text")]
    EmptyResponse,

    /// The reply could not be interpreted
    #[error("malformed response: {message}")]
    Parse {
        /// What was wrong with the payload
        message: String,
    },
}

impl ProviderError {
    /// Get the error kind
    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Network { .. } => ProviderErrorKind::Network,
            Self::Timeout { .. } => ProviderErrorKind::Timeout,
            Self::HttpStatus { .. } => ProviderErrorKind::HttpStatus,
            Self::EmptyResponse => ProviderErrorKind::EmptyResponse,
            Self::Parse { .. } => ProviderErrorKind::Parse,
        }
    }

    /// Build a timeout error for the given budget
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Build an HTTP status error, truncating very large bodies
    pub fn http_status(code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let body = match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body,
        };
        Self::HttpStatus { code, body }
    }

    /// Build a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Classify a transport-level `reqwest` failure
    #[must_use]
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(timeout)
        } else if err.is_decode() {
            Self::parse(err.to_string())
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

// =============================================================================
// Pool Errors
// =============================================================================

/// Errors surfaced by the pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every eligible provider was tried once and all of them failed
    #[error(
        "all providers failed; last error: {}",
        .last_error.as_deref().unwrap_or("none")
    )]
    Exhausted {
        /// Diagnostic from the last failed attempt
        last_error: Option<String>,
    },

    /// The pool was built without any providers
    #[error("no providers configured; generation features must stay disabled")]
    NoProviders,

    /// Two providers were registered under the same name
    #[error("duplicate provider name '{name}'; stats are keyed by name")]
    DuplicateProvider {
        /// The name registered more than once
        name: String,
    },

    /// Provider configuration could not be turned into a pool
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from reading or writing the persisted stats document
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("stats file I/O failed at {}: {source}", .path.display())]
    Io {
        /// File that was being accessed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The document was not valid JSON for a stats table
    #[error("invalid stats document: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            ProviderError::timeout(Duration::from_secs(30)).kind(),
            ProviderErrorKind::Timeout
        );
        assert_eq!(
            ProviderError::http_status(429, "quota").kind(),
            ProviderErrorKind::HttpStatus
        );
        assert_eq!(
            ProviderError::EmptyResponse.kind(),
            ProviderErrorKind::EmptyResponse
        );
        assert_eq!(ProviderError::parse("bad").kind(), ProviderErrorKind::Parse);
    }

    #[test]
    fn test_display_carries_details() {
        let err = ProviderError::http_status(429, "Too Many Requests");
        assert_eq!(err.to_string(), "HTTP 429: Too Many Requests");

        let err = ProviderError::timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30000ms");
    }

    #[test]
    fn test_http_body_truncated() {
        let body = "x".repeat(5000);
        let ProviderError::HttpStatus { body, .. } = ProviderError::http_status(500, body) else {
            panic!("Expected HttpStatus");
        };
        assert_eq!(body.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_exhausted_message() {
        let err = PoolError::Exhausted {
            last_error: Some("groq-1: HTTP 503: down".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "all providers failed; last error: groq-1: HTTP 503: down"
        );

        let err = PoolError::Exhausted { last_error: None };
        assert_eq!(err.to_string(), "all providers failed; last error: none");
    }
}
