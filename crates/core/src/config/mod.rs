//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CRAWL_CACHE_*)
//! 2. TOML config file (if CRAWL_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheOptions;

mod route;
mod validation;

pub use route::TopicRoute;
pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CRAWL_CACHE_*)
/// 2. TOML config file (if CRAWL_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite dedup database.
    ///
    /// Set via CRAWL_CACHE_CACHE_PATH environment variable.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Retention window for seen URLs, in seconds.
    ///
    /// Set via CRAWL_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Number of recently added keys kept in memory.
    ///
    /// Set via CRAWL_CACHE_HOT_CAPACITY environment variable.
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,

    /// Lifetime of an in-memory entry in milliseconds. Must be below the TTL.
    ///
    /// Set via CRAWL_CACHE_HOT_TTL_MS environment variable.
    #[serde(default = "default_hot_ttl_ms")]
    pub hot_ttl_ms: u64,

    /// Topic routes in `read_topic:write_topic` form.
    ///
    /// Set via CRAWL_CACHE_TOPICS environment variable, e.g. `[crawl.in:crawl.out]`.
    #[serde(default)]
    pub topics: Vec<String>,

    /// nsqd HTTP endpoint used for publishing.
    ///
    /// Set via CRAWL_CACHE_NSQD_HTTP_ADDR environment variable.
    #[serde(default = "default_nsqd_http_addr")]
    pub nsqd_http_addr: String,

    /// nsqd TCP addresses to consume read topics from.
    ///
    /// Set via CRAWL_CACHE_NSQD_TCP_ADDRS environment variable, e.g. `[127.0.0.1:4150]`.
    #[serde(default)]
    pub nsqd_tcp_addrs: Vec<String>,

    /// nsqlookupd HTTP addresses used to discover nsqd. Win over `nsqd_tcp_addrs`.
    ///
    /// Set via CRAWL_CACHE_NSQLOOKUPD_ADDRS environment variable.
    #[serde(default)]
    pub nsqlookupd_addrs: Vec<String>,

    /// nsq channel registered on every read topic.
    ///
    /// Set via CRAWL_CACHE_CHANNEL environment variable.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Publish request timeout in milliseconds.
    ///
    /// Set via CRAWL_CACHE_PUBLISH_TIMEOUT_MS environment variable.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// User-Agent string for publish requests.
    ///
    /// Set via CRAWL_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Concurrent workers per topic route.
    ///
    /// Set via CRAWL_CACHE_WORKERS environment variable.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Messages buffered per route and worker before input is throttled.
    ///
    /// Set via CRAWL_CACHE_QUEUE_DEPTH environment variable.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Deliveries of a failing message before it is given up.
    ///
    /// Set via CRAWL_CACHE_MAX_ATTEMPTS environment variable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u16,

    /// Delay before a failed message is delivered again, in milliseconds.
    ///
    /// Set via CRAWL_CACHE_REQUEUE_DELAY_MS environment variable.
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,

    /// Log filter used when RUST_LOG is not set.
    ///
    /// Set via CRAWL_CACHE_LOG_LEVEL environment variable.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("/tmp/crawl-cache")
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_hot_capacity() -> usize {
    10_000
}

fn default_hot_ttl_ms() -> u64 {
    60_000
}

fn default_nsqd_http_addr() -> String {
    "http://127.0.0.1:4151".into()
}

fn default_channel() -> String {
    "consumer".into()
}

fn default_publish_timeout_ms() -> u64 {
    5_000
}

fn default_user_agent() -> String {
    "crawl-cache/0.1".into()
}

fn default_workers() -> usize {
    1
}

fn default_queue_depth() -> usize {
    16
}

fn default_max_attempts() -> u16 {
    5
}

fn default_requeue_delay_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
            hot_capacity: default_hot_capacity(),
            hot_ttl_ms: default_hot_ttl_ms(),
            topics: Vec::new(),
            nsqd_http_addr: default_nsqd_http_addr(),
            nsqd_tcp_addrs: Vec::new(),
            nsqlookupd_addrs: Vec::new(),
            channel: default_channel(),
            publish_timeout_ms: default_publish_timeout_ms(),
            user_agent: default_user_agent(),
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            max_attempts: default_max_attempts(),
            requeue_delay_ms: default_requeue_delay_ms(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    /// Whether read topics come from nsqd rather than stdin.
    pub fn consumes_nsq(&self) -> bool {
        self.nsqd_tcp_addrs.iter().chain(&self.nsqlookupd_addrs).any(|addr| !addr.trim().is_empty())
    }

    /// Messages buffered per route: `queue_depth` for each worker.
    pub fn queue_capacity(&self) -> usize {
        self.workers.saturating_mul(self.queue_depth).max(1)
    }

    /// nsqd in-flight window per route, one `queue_depth` per worker.
    pub fn max_in_flight(&self) -> u32 {
        u32::try_from(self.queue_capacity()).unwrap_or(u32::MAX)
    }

    /// Dedup cache settings derived from this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl(),
            hot_capacity: self.hot_capacity,
            hot_lifetime: Duration::from_millis(self.hot_ttl_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CRAWL_CACHE_`
    /// 2. TOML file from `CRAWL_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CRAWL_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CRAWL_CACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed topic routes, failing when none are configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no routes are set, or
    /// `ConfigError::Invalid` if one does not parse.
    pub fn require_topics(&self) -> Result<Vec<TopicRoute>, ConfigError> {
        if self.topics.is_empty() {
            return Err(ConfigError::Missing {
                field: "topics".into(),
                hint: "Set CRAWL_CACHE_TOPICS, e.g. [crawl.in:crawl.out]".into(),
            });
        }
        self.routes()
    }

    /// Parse every configured topic route.
    pub fn routes(&self) -> Result<Vec<TopicRoute>, ConfigError> {
        self.topics
            .iter()
            .map(|raw| raw.parse::<TopicRoute>())
            .collect()
    }
}
