//! nsqd transport error types.

use std::sync::Arc;

use crawl_cache_core::Error;

/// Errors from talking to nsqd.
#[derive(Debug, thiserror::Error)]
pub enum NsqError {
    /// Topic name nsqd would reject.
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// Channel name nsqd would reject.
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// nsqd HTTP address is not a usable URL.
    #[error("invalid nsqd address: {0}")]
    InvalidAddress(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// nsqd answered with a non-success status.
    #[error("HTTP error: {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Consumer has neither nsqd nor nsqlookupd addresses.
    #[error("no nsqd or nsqlookupd addresses configured")]
    MissingSources,
}

impl From<reqwest::Error> for NsqError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NsqError::Timeout } else { NsqError::Network(Arc::new(err)) }
    }
}

impl From<NsqError> for Error {
    fn from(err: NsqError) -> Self {
        Error::Publish(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NsqError::InvalidTopic("bad topic".to_string());
        assert!(err.to_string().contains("invalid topic"));

        let err = NsqError::HttpError { status: 400, body: "BAD_TOPIC".to_string() };
        assert_eq!(err.to_string(), "HTTP error: 400: BAD_TOPIC");

        let err = NsqError::InvalidChannel("two words".to_string());
        assert_eq!(err.to_string(), "invalid channel name: \"two words\"");
    }

    #[test]
    fn test_converts_to_publish_error() {
        let err: Error = NsqError::Timeout.into();
        assert!(matches!(err, Error::Publish(ref msg) if msg == "request timeout"));
        assert!(err.is_retryable());
    }
}
