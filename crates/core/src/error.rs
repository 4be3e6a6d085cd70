//! Unified error types for crawl-cache.
//!
//! Display strings carry a stable code prefix so log lines can be grouped
//! by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the dedup cache and pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid construction parameters (e.g., zero TTL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Inbound payload could not be decoded into a request.
    #[error("DECODE_ERROR: {0}")]
    Decode(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value is not a valid timestamp.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Forwarding to the outbound topic failed.
    #[error("PUBLISH_ERROR: {0}")]
    Publish(String),

    /// Best-effort removal of an expired entry failed.
    #[error("RECLAIM_ERROR: {key}: {source}")]
    Reclamation { key: String, source: Box<Error> },
}

impl Error {
    /// Whether redelivering the message that hit this error may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Publish(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Decode("missing field `url`".to_string());
        assert!(err.to_string().starts_with("DECODE_ERROR"));
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_reclamation_display_includes_cause() {
        let err = Error::Reclamation {
            key: "example.com/a".to_string(),
            source: Box::new(Error::Database(tokio_rusqlite::Error::ConnectionClosed)),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("RECLAIM_ERROR: example.com/a"));
        assert!(msg.contains("CACHE_ERROR"));
    }

    #[test]
    fn test_retryable_classes() {
        assert!(Error::Publish("nsqd down".into()).is_retryable());
        assert!(Error::Database(tokio_rusqlite::Error::ConnectionClosed).is_retryable());
        assert!(!Error::Decode("bad json".into()).is_retryable());
        assert!(!Error::InvalidInput("ttl".into()).is_retryable());

        let reclaim = Error::Reclamation {
            key: "example.com/a".to_string(),
            source: Box::new(Error::Database(tokio_rusqlite::Error::ConnectionClosed)),
        };
        assert!(!reclaim.is_retryable());
    }
}
