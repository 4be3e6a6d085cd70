//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MAX_WORKERS: usize = 256;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `ttl_secs` or `hot_capacity` is 0
    /// - `hot_ttl_ms` is not below the TTL
    /// - `workers` is 0 or above 256
    /// - `max_attempts` or `queue_depth` is 0
    /// - `publish_timeout_ms` is below 100ms or above 5 minutes
    /// - `user_agent`, `nsqd_http_addr` or `channel` is empty
    /// - a topic route does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "ttl_secs".into(), reason: "must be greater than 0".into() });
        }

        if self.hot_capacity == 0 {
            return Err(ConfigError::Invalid { field: "hot_capacity".into(), reason: "must be greater than 0".into() });
        }
        if u128::from(self.hot_ttl_ms) >= self.ttl().as_millis() {
            return Err(ConfigError::Invalid {
                field: "hot_ttl_ms".into(),
                reason: format!("must be shorter than the ttl ({}s)", self.ttl_secs),
            });
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid {
                field: "workers".into(),
                reason: format!("must be between 1 and {MAX_WORKERS}"),
            });
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid { field: "max_attempts".into(), reason: "must be at least 1".into() });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid { field: "queue_depth".into(), reason: "must be at least 1".into() });
        }

        if self.publish_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "publish_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.publish_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "publish_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.nsqd_http_addr.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "nsqd_http_addr".into(), reason: "must not be empty".into() });
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "channel".into(), reason: "must not be empty".into() });
        }

        let routes = self.routes()?;
        let mut reads: Vec<&str> = routes.iter().map(|r| r.read.as_str()).collect();
        reads.sort_unstable();
        if reads.windows(2).any(|pair| pair[0] == pair[1]) {
            tracing::warn!(
                routes = routes.len(),
                "the same read topic appears in more than one route; each message is handled once per route"
            );
        }

        Ok(())
    }
}
