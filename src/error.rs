//! Error types for media-relay
//!
//! Only a small part of this taxonomy ever leaves a run:
//! - [`LinkError`] rejects a run before it starts
//! - [`Error::Config`] rejects an unusable settings snapshot
//! - [`Error::FatalAuth`] aborts a run in flight
//!
//! Everything else (transient network failures, timeouts, rate limits, unavailable
//! media, cancellation) is caught at the transfer engine boundary and turned into a
//! per-item outcome.

use std::time::Duration;
use thiserror::Error;

use crate::types::ChannelRef;

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "destinations")
        key: Option<String>,
    },

    /// Invalid start/end message links
    #[error("invalid message link: {0}")]
    Link(#[from] LinkError),

    /// Transient network failure reported by the transport
    #[error("transfer error: {0}")]
    Transfer(String),

    /// A single network operation exceeded its deadline
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Protocol-level backpressure, the transport mandates waiting before retrying
    #[error("rate limited: retry after {0:?}")]
    RateLimited(Duration),

    /// The media cannot be transferred at all (expired reference, rejected upload, ...)
    #[error("media unavailable: {0}")]
    MediaUnavailable(String),

    /// The session lost authorization; continuing the run is meaningless
    #[error("authorization failed: {0}")]
    FatalAuth(String),

    /// The operation was cancelled by the user
    #[error("cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Returns true if the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalAuth(_))
    }

    /// Returns true if the error is a user-triggered cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Errors produced while resolving a pair of permalinks into a message range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The link does not have the shape `https://<host>/c/<channel>/<id>` or
    /// `https://<host>/<handle>/<id>`
    #[error("malformed link {link:?}: {reason}")]
    Parse {
        /// The offending input
        link: String,
        /// What was wrong with it
        reason: String,
    },

    /// The two links point at different channels
    #[error("links reference different channels ({start} vs {end})")]
    ChannelMismatch {
        /// Channel of the start link
        start: ChannelRef,
        /// Channel of the end link
        end: ChannelRef,
    },

    /// The end message id precedes the start message id
    #[error("end message {end} precedes start message {start}")]
    RangeOrder {
        /// Start message id
        start: i64,
        /// End message id
        end: i64,
    },
}

impl LinkError {
    pub(crate) fn parse(link: &str, reason: impl Into<String>) -> Self {
        LinkError::Parse {
            link: link.to_string(),
            reason: reason.into(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_failures_are_fatal() {
        assert!(Error::FatalAuth("AUTH_KEY_UNREGISTERED".into()).is_fatal());
        assert!(!Error::Transfer("connection reset".into()).is_fatal());
        assert!(!Error::Cancelled.is_fatal());
        assert!(!Error::RateLimited(Duration::from_secs(3)).is_fatal());
    }

    #[test]
    fn link_errors_convert_into_error() {
        let err: Error = LinkError::RangeOrder { start: 10, end: 2 }.into();
        assert!(matches!(err, Error::Link(LinkError::RangeOrder { .. })));
        assert_eq!(
            err.to_string(),
            "invalid message link: end message 2 precedes start message 10"
        );
    }

    #[test]
    fn config_error_carries_key() {
        match Error::config("destinations", "at least one destination is required") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("destinations"));
                assert!(message.contains("destination"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }
}
