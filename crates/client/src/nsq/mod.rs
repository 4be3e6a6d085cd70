//! nsqd transport.
//!
//! Forwards accepted crawl requests to the outbound topic through nsqd's
//! HTTP interface. Inbound topics are consumed over TCP, see [`consumer`].
//!
//! ### Endpoint
//!
//! - `POST {nsqd_http_addr}/pub?topic=<topic>` with the JSON request as body.
//! - nsqd replies `200 OK`; anything else is a publish failure.
//!
//! ### Topic and Channel Names
//!
//! - 1 to 64 characters of `[.a-zA-Z0-9_-]`, optionally suffixed `#ephemeral`,
//!   the same rule nsqd applies. Checked locally so a typo fails fast instead
//!   of round-tripping.

pub mod consumer;
pub mod error;

pub use consumer::{ConsumerSettings, Discovery, NsqDelivery, NsqSubscription};
pub use error::NsqError;

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use crawl_cache_core::{Error, Publisher, Request};
use regex::Regex;
use reqwest::header;
use url::Url;

/// Default nsqd HTTP address.
const DEFAULT_HTTP_ADDR: &str = "http://127.0.0.1:4151";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "crawl-cache/0.1";

const MAX_NAME_LEN: usize = 64;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.a-zA-Z0-9_-]+(#ephemeral)?$").expect("name pattern compiles"));

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && NAME_PATTERN.is_match(name)
}

/// nsqd publisher configuration.
#[derive(Debug, Clone)]
pub struct NsqConfig {
    /// nsqd HTTP address (default: http://127.0.0.1:4151).
    pub http_addr: String,
    /// Request timeout (default: 5s).
    pub timeout: Duration,
    /// User-agent string (default: crawl-cache/0.x).
    pub user_agent: String,
}

impl Default for NsqConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Check a topic name against nsqd's naming rule.
pub fn validate_topic(topic: &str) -> Result<(), NsqError> {
    if !is_valid_name(topic) {
        return Err(NsqError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Check a channel name against nsqd's naming rule.
pub fn validate_channel(channel: &str) -> Result<(), NsqError> {
    if !is_valid_name(channel) {
        return Err(NsqError::InvalidChannel(channel.to_string()));
    }
    Ok(())
}

/// Publishes requests to nsqd over HTTP.
#[derive(Debug, Clone)]
pub struct NsqPublisher {
    http: reqwest::Client,
    base: Url,
}

impl NsqPublisher {
    /// Create a new publisher with the given configuration.
    pub fn new(config: NsqConfig) -> Result<Self, NsqError> {
        let base = parse_base(&config.http_addr)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()?;

        Ok(Self { http, base })
    }

    /// Full publish URL for `topic`.
    pub fn publish_url(&self, topic: &str) -> Result<Url, NsqError> {
        validate_topic(topic)?;
        let mut url = self.base.join("pub").map_err(|e| NsqError::InvalidAddress(e.to_string()))?;
        url.query_pairs_mut().append_pair("topic", topic);
        Ok(url)
    }

    /// Publish a raw message body.
    pub async fn publish_bytes(&self, topic: &str, body: Vec<u8>) -> Result<(), NsqError> {
        let url = self.publish_url(topic)?;
        let start = Instant::now();

        let response = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NsqError::HttpError { status: status.as_u16(), body: body.trim().to_string() });
        }

        tracing::trace!(topic, elapsed = ?start.elapsed(), "published to nsqd");
        Ok(())
    }
}

fn parse_base(addr: &str) -> Result<Url, NsqError> {
    let mut base = Url::parse(addr.trim()).map_err(|e| NsqError::InvalidAddress(format!("{addr}: {e}")))?;

    match base.scheme() {
        "http" | "https" => {}
        scheme => return Err(NsqError::InvalidAddress(format!("unsupported scheme: {scheme}"))),
    }
    if base.cannot_be_a_base() {
        return Err(NsqError::InvalidAddress(addr.to_string()));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);

    Ok(base)
}

#[async_trait::async_trait]
impl Publisher for NsqPublisher {
    async fn publish(&self, topic: &str, request: &Request) -> Result<(), Error> {
        self.publish_bytes(topic, request.payload().to_vec()).await.map_err(Error::from)
    }
}
