//! Error types shared across the pipeline.
//!
//! Two layers exist. [`FetchError`] describes a single failed network
//! attempt and never escapes a source fetcher: it is absorbed into the
//! [`ErrorTracker`](crate::error_tracker::ErrorTracker) and turned into an
//! empty result set. [`IntelError`] is what the public entry points return,
//! and its only expected variant in normal operation is
//! [`IntelError::InvalidEmail`].

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`Pipeline`](crate::pipeline::Pipeline) entry points.
#[derive(Debug, Error)]
pub enum IntelError {
    /// The target address failed validation. Raised before any I/O.
    #[error("invalid email '{email}': {reason}")]
    InvalidEmail { email: String, reason: String },

    /// The profile store failed to read or write.
    #[error("profile store failure: {0}")]
    Store(#[source] anyhow::Error),

    /// Extraction rules could not be compiled.
    #[error("invalid extraction rules: {0}")]
    Rules(String),
}

/// A failed fetch attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("unexpected content-type '{0}'")]
    UnexpectedContent(String),

    #[error("response body too small ({0} bytes)")]
    TooSmall(usize),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, transport failures, 429 and 5xx are retried. Other 4xx and
    /// content rejections are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Transport(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::UnexpectedContent(_) | FetchError::TooSmall(_) => false,
        }
    }

    /// Short machine label used by the error tracker.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::UnexpectedContent(_) => "content_type",
            FetchError::TooSmall(_) => "too_small",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(FetchError::Transport("reset".into()).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::UnexpectedContent("text/html".into()).is_retryable());
        assert!(!FetchError::TooSmall(10).is_retryable());
    }

    #[test]
    fn invalid_email_message_names_the_input() {
        let err = IntelError::InvalidEmail {
            email: "nope".into(),
            reason: "missing @".into(),
        };
        assert_eq!(err.to_string(), "invalid email 'nope': missing @");
    }
}
