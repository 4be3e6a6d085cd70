//! Line-delimited message source.
//!
//! Reads JSON envelopes, one per line, and fans each out to the routes
//! subscribed to its topic:
//!
//! ```text
//! {"topic":"crawl.in","body":{"url":"http://www.site.com/a","depth":1}}
//! ```
//!
//! The envelope body is passed on as the exact bytes it had on the line, so
//! consumers see what a producer would have published to the topic.
//!
//! Route queues are bounded. Reading pauses while a route's queue is full,
//! so input is pulled only as fast as the workers drain it.

mod delivery;

pub use delivery::LineDelivery;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crawl_cache_core::Subscription;
use serde::Deserialize;
use serde_json::value::RawValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Mutex, mpsc};

use delivery::Requeue;

/// Line source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Underlying reader failed.
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),
}

/// Queueing and redelivery policy.
#[derive(Debug, Clone, Copy)]
pub struct SourceSettings {
    /// Deliveries before a failing message is given up (minimum 1).
    pub max_attempts: u16,
    /// Delay before a failed message is delivered again.
    pub requeue_delay: Duration,
    /// Messages buffered per route before reading pauses (minimum 1).
    pub queue_capacity: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self { max_attempts: 5, requeue_delay: Duration::from_secs(1), queue_capacity: 64 }
    }
}

/// Counters for one run of the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Non-blank lines read.
    pub read: u64,
    /// Deliveries handed to routes. A line read by two routes counts twice.
    pub dispatched: u64,
    /// Lines dropped as malformed or unrouted.
    pub dropped: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<'a> {
    topic: String,
    #[serde(borrow)]
    body: &'a RawValue,
}

/// Receiving end of one route, shared by that route's workers.
#[derive(Debug, Clone)]
pub struct LineSubscription {
    topic: String,
    rx: Arc<Mutex<mpsc::Receiver<LineDelivery>>>,
}

#[async_trait::async_trait]
impl Subscription for LineSubscription {
    type Delivery = LineDelivery;

    fn topic(&self) -> &str {
        &self.topic
    }

    /// Next delivery, or `None` once the source is done and every
    /// outstanding message has been settled.
    async fn next(&self) -> Option<LineDelivery> {
        self.rx.lock().await.recv().await
    }
}

/// Reads envelopes and dispatches them to subscribed routes.
#[derive(Debug)]
pub struct LineSource {
    settings: SourceSettings,
    routes: HashMap<String, Vec<Requeue>>,
}

impl LineSource {
    pub fn new(settings: SourceSettings) -> Self {
        let settings = SourceSettings {
            max_attempts: settings.max_attempts.max(1),
            queue_capacity: settings.queue_capacity.max(1),
            ..settings
        };
        Self { settings, routes: HashMap::new() }
    }

    /// Register a route reading `topic`.
    ///
    /// Each call creates an independent route; a topic subscribed twice gets
    /// every message twice.
    pub fn subscribe(&mut self, topic: &str) -> LineSubscription {
        let (tx, rx) = mpsc::channel(self.settings.queue_capacity);
        let requeue = Requeue { tx, max_attempts: self.settings.max_attempts, delay: self.settings.requeue_delay };
        self.routes.entry(topic.to_string()).or_default().push(requeue);

        LineSubscription { topic: topic.to_string(), rx: Arc::new(Mutex::new(rx)) }
    }

    /// Read `reader` to the end, dispatching each envelope.
    ///
    /// Consumes the source. Waits whenever a route's queue is full. Route
    /// queues close once the input is exhausted and all in-flight messages
    /// are settled.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Read` if the reader fails. Malformed lines are
    /// logged and skipped, never returned.
    pub async fn run<R>(self, reader: R) -> Result<SourceStats, SourceError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = SourceStats::default();
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.read += 1;

            let envelope: Envelope<'_> = match serde_json::from_str(line) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed envelope");
                    stats.dropped += 1;
                    continue;
                }
            };

            let Some(routes) = self.routes.get(&envelope.topic) else {
                tracing::warn!(topic = %envelope.topic, "dropping message for unsubscribed topic");
                stats.dropped += 1;
                continue;
            };

            let body = Bytes::copy_from_slice(envelope.body.get().as_bytes());
            for requeue in routes {
                let delivery = LineDelivery::new(envelope.topic.clone(), body.clone(), requeue.clone());
                if requeue.tx.send(delivery).await.is_err() {
                    tracing::warn!(topic = %envelope.topic, "route closed, message not delivered");
                    continue;
                }
                stats.dispatched += 1;
            }
        }

        tracing::info!(read = stats.read, dispatched = stats.dispatched, dropped = stats.dropped, "input exhausted");
        Ok(stats)
    }
}
