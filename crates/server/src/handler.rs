//! Dedup pipeline handler.
//!
//! Decides, per inbound crawl request, whether it is new within the
//! retention window. New requests are forwarded to the route's outbound
//! topic and recorded; repeats are acknowledged and dropped.

use std::sync::Arc;

use crawl_cache_core::{CacheDb, CacheKey, DedupCache, Delivery, KvStore, Outcome, Publisher, Request};

/// Runs the dedup state machine for one topic route.
pub struct DedupHandler<S = CacheDb> {
    cache: Arc<DedupCache<S>>,
    publisher: Arc<dyn Publisher>,
    write_topic: String,
}

impl<S> Clone for DedupHandler<S> {
    fn clone(&self) -> Self {
        Self { cache: self.cache.clone(), publisher: self.publisher.clone(), write_topic: self.write_topic.clone() }
    }
}

impl<S: KvStore> DedupHandler<S> {
    pub fn new(cache: Arc<DedupCache<S>>, publisher: Arc<dyn Publisher>, write_topic: impl Into<String>) -> Self {
        Self { cache, publisher, write_topic: write_topic.into() }
    }

    pub fn write_topic(&self) -> &str {
        &self.write_topic
    }

    /// Process one message body.
    ///
    /// - undecodable body: `Discard`
    /// - cache lookup fails: `Retry`
    /// - seen within the TTL: `Success`, nothing published
    /// - publish fails: `Retry`, key not recorded
    /// - otherwise publish, record the key and return `Success`. Failing to
    ///   record only costs a duplicate later, so it is logged, not retried.
    pub async fn process(&self, body: &[u8]) -> Outcome {
        let request = match Request::decode(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable message");
                return Outcome::from(&e);
            }
        };

        let key = CacheKey::normalize(&request.url);
        tracing::debug!(url = %request.url, %key, "processing request");

        match self.cache.has(&key).await {
            Ok(true) => {
                tracing::debug!(%key, "already seen, skipping");
                return Outcome::Success;
            }
            Ok(false) => tracing::debug!(%key, "not seen, forwarding"),
            Err(e) => {
                tracing::error!(%key, error = %e, "cache lookup failed");
                return Outcome::Retry;
            }
        }

        if let Err(e) = self.publisher.publish(&self.write_topic, &request).await {
            tracing::error!(%key, topic = %self.write_topic, error = %e, "publish failed");
            return Outcome::Retry;
        }

        if let Err(e) = self.cache.add(&key).await {
            tracing::error!(%key, error = %e, "failed to record forwarded request");
        }

        Outcome::Success
    }

    /// Process a delivery and settle it with the resulting outcome.
    pub async fn handle<D: Delivery>(&self, delivery: D) -> Outcome {
        let outcome = self.process(delivery.body()).await;
        delivery.settle(outcome);
        outcome
    }
}
