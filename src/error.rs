//! Error types for subrelay
//!
//! Errors fall into two groups:
//! - Fatal startup errors ([`Error::Config`], [`Error::Credential`]) that abort the process
//! - Per-source and per-item errors that the relay loop logs and contains within a pass

use std::time::Duration;
use thiserror::Error;

/// Result type alias for subrelay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for subrelay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or file location that caused the error
        key: Option<String>,
    },

    /// A required credential is missing or malformed
    #[error("credential error: {var}: {message}")]
    Credential {
        /// Name of the environment variable
        var: String,
        /// What is wrong with it
        message: String,
    },

    /// Fetching a source's listing failed; retried on the next pass
    #[error("source r/{source_name} unavailable: {reason}")]
    SourceUnavailable {
        /// Source identifier (subreddit name)
        source_name: String,
        /// Underlying failure
        reason: String,
    },

    /// Fetching comments for an item failed; callers substitute an empty list
    #[error("failed to fetch comments for {item_id}: {reason}")]
    CommentFetch {
        /// Item whose comments were requested
        item_id: String,
        /// Underlying failure
        reason: String,
    },

    /// Sending a message to a destination failed; the item stays unseen
    #[error("delivery to topic {topic_id} failed: {reason}")]
    Delivery {
        /// Destination topic
        topic_id: i64,
        /// Underlying failure
        reason: String,
    },

    /// The remote API asked us to slow down (HTTP 429)
    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited {
        /// Server-provided wait hint, when present
        retry_after: Option<Duration>,
    },

    /// The remote API answered with an error status or an error body
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error description returned by the API
        message: String,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error tied to a key or location
    pub fn config_at(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a credential error for an environment variable
    pub fn credential(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Wrap any error as a source failure
    pub fn source_unavailable(source: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any error as a comment fetch failure
    pub fn comment_fetch(item_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CommentFetch {
            item_id: item_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any error as a delivery failure
    pub fn delivery(topic_id: i64, reason: impl std::fmt::Display) -> Self {
        Self::Delivery {
            topic_id,
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Credential { .. })
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("bad").is_fatal());
        assert!(Error::credential("REDDIT_USERNAME", "not set").is_fatal());
        assert!(!Error::source_unavailable("aww", "timeout").is_fatal());
        assert!(!Error::delivery(42, "chat not found").is_fatal());
        assert!(!Error::comment_fetch("abc", "404").is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::source_unavailable("aww", "HTTP 503");
        assert_eq!(err.to_string(), "source r/aww unavailable: HTTP 503");

        let err = Error::credential("TELEGRAM_GROUP_ID", "not an integer");
        assert_eq!(
            err.to_string(),
            "credential error: TELEGRAM_GROUP_ID: not an integer"
        );

        let err = Error::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 7s");

        let err = Error::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_config_at_keeps_key() {
        match Error::config_at("subreddits.db:3", "expected two fields") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("subreddits.db:3"));
                assert_eq!(message, "expected two fields");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
