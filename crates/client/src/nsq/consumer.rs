//! nsqd TCP consumer.
//!
//! Each route subscribes to its read topic on a shared channel name, either
//! through nsqlookupd discovery or straight to a list of nsqd daemons.
//!
//! ### Settling
//!
//! - `ack`: `FIN`.
//! - `fail`: `REQ` with the configured delay, or `FIN` with a warning once
//!   the message has been delivered `max_attempts` times.
//! - `discard`: `FIN` with a warning.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crawl_cache_core::{Delivery, Subscription};
use tokio::sync::Mutex;
use tokio_nsq::{
    NSQChannel, NSQConsumer, NSQConsumerConfig, NSQConsumerConfigSources, NSQConsumerLookupConfig, NSQMessage,
    NSQRequeueDelay, NSQTopic,
};

use super::{NsqError, validate_channel, validate_topic};

/// How the consumer finds nsqd instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// nsqlookupd HTTP endpoints.
    Lookup(Vec<String>),
    /// nsqd TCP addresses (`host:port`).
    Daemons(Vec<String>),
}

/// Consumer settings shared by every route.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Channel name registered on each read topic.
    pub channel: String,
    /// nsqd TCP addresses.
    pub nsqd_tcp_addrs: Vec<String>,
    /// nsqlookupd HTTP addresses. Take precedence over `nsqd_tcp_addrs`.
    pub nsqlookupd_addrs: Vec<String>,
    /// Messages nsqd may push before any is settled.
    pub max_in_flight: u32,
    /// Deliveries before a failing message is given up (minimum 1).
    pub max_attempts: u16,
    /// Requeue delay sent with `REQ`.
    pub requeue_delay: Duration,
}

impl ConsumerSettings {
    /// Resolve the discovery mode.
    ///
    /// nsqlookupd wins when both lists are set. Lookup addresses without a
    /// scheme get `http://`.
    pub fn discovery(&self) -> Result<Discovery, NsqError> {
        let lookup: Vec<String> = self
            .nsqlookupd_addrs
            .iter()
            .map(|addr| addr.trim())
            .filter(|addr| !addr.is_empty())
            .map(|addr| if addr.contains("://") { addr.to_string() } else { format!("http://{addr}") })
            .collect();
        let daemons: Vec<String> = self
            .nsqd_tcp_addrs
            .iter()
            .map(|addr| addr.trim())
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();

        match (lookup.is_empty(), daemons.is_empty()) {
            (false, daemons_empty) => {
                if !daemons_empty {
                    tracing::warn!(
                        nsqd = daemons.len(),
                        "nsqlookupd addresses set, direct nsqd addresses are ignored"
                    );
                }
                Ok(Discovery::Lookup(lookup))
            }
            (true, false) => Ok(Discovery::Daemons(daemons)),
            (true, true) => Err(NsqError::MissingSources),
        }
    }
}

/// Settling policy carried by each delivery.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u16,
    requeue_delay: Duration,
}

impl RetryPolicy {
    fn exhausted(&self, attempts: u16) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

/// One route's nsqd consumer, shared by that route's workers.
#[derive(Clone)]
pub struct NsqSubscription {
    topic: String,
    consumer: Arc<Mutex<NSQConsumer>>,
    policy: RetryPolicy,
}

impl NsqSubscription {
    /// Subscribe to `topic` on the configured channel.
    ///
    /// Connections are made in the background; this only fails on bad names
    /// or a missing address list.
    pub fn connect(topic: &str, settings: &ConsumerSettings) -> Result<Self, NsqError> {
        validate_topic(topic)?;
        validate_channel(&settings.channel)?;
        let sources = match settings.discovery()? {
            Discovery::Lookup(addrs) => NSQConsumerConfigSources::Lookup(
                NSQConsumerLookupConfig::new().set_addresses(addrs.into_iter().collect::<HashSet<_>>()),
            ),
            Discovery::Daemons(addrs) => NSQConsumerConfigSources::Daemons(addrs),
        };

        let nsq_topic = NSQTopic::new(topic.to_string()).ok_or_else(|| NsqError::InvalidTopic(topic.to_string()))?;
        let nsq_channel = NSQChannel::new(settings.channel.clone())
            .ok_or_else(|| NsqError::InvalidChannel(settings.channel.clone()))?;

        let consumer = NSQConsumerConfig::new(nsq_topic, nsq_channel)
            .set_max_in_flight(settings.max_in_flight.max(1))
            .set_sources(sources)
            .build();

        tracing::info!(topic, channel = %settings.channel, "nsq consumer registered");
        Ok(Self {
            topic: topic.to_string(),
            consumer: Arc::new(Mutex::new(consumer)),
            policy: RetryPolicy { max_attempts: settings.max_attempts, requeue_delay: settings.requeue_delay },
        })
    }
}

#[async_trait::async_trait]
impl Subscription for NsqSubscription {
    type Delivery = NsqDelivery;

    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next(&self) -> Option<NsqDelivery> {
        let message = self.consumer.lock().await.consume_filtered().await?;
        Some(NsqDelivery { topic: self.topic.clone(), message, policy: self.policy })
    }
}

/// A message pushed by nsqd.
pub struct NsqDelivery {
    topic: String,
    message: NSQMessage,
    policy: RetryPolicy,
}

impl NsqDelivery {
    /// Delivery count reported by nsqd, starting at 1.
    pub fn attempts(&self) -> u16 {
        self.message.attempt
    }
}

impl Delivery for NsqDelivery {
    fn body(&self) -> &[u8] {
        &self.message.body
    }

    fn ack(self) {
        tracing::debug!(topic = %self.topic, attempts = self.attempts(), "message finished");
        tokio::spawn(self.message.finish());
    }

    fn fail(self) {
        let attempts = self.attempts();
        if self.policy.exhausted(attempts) {
            tracing::warn!(topic = %self.topic, attempts, "giving up on message after max attempts");
            tokio::spawn(self.message.finish());
            return;
        }

        tracing::debug!(topic = %self.topic, attempts, delay = ?self.policy.requeue_delay, "requeueing message");
        tokio::spawn(self.message.requeue(NSQRequeueDelay::CustomDelay(self.policy.requeue_delay)));
    }

    fn discard(self) {
        tracing::warn!(topic = %self.topic, attempts = self.attempts(), "message discarded");
        tokio::spawn(self.message.finish());
    }
}
