//! Acknowledgement handle for stdin-sourced messages.

use std::time::Duration;

use bytes::Bytes;
use crawl_cache_core::Delivery;
use tokio::sync::mpsc::Sender;

/// Where a failed delivery goes back to, and how often it may.
#[derive(Debug, Clone)]
pub(crate) struct Requeue {
    pub(crate) tx: Sender<LineDelivery>,
    pub(crate) max_attempts: u16,
    pub(crate) delay: Duration,
}

/// One message read from the line source.
///
/// Holds a sender back into its route's queue, so the queue stays open
/// until every in-flight message is settled.
#[derive(Debug)]
pub struct LineDelivery {
    topic: String,
    body: Bytes,
    attempts: u16,
    requeue: Requeue,
}

impl LineDelivery {
    pub(crate) fn new(topic: String, body: Bytes, requeue: Requeue) -> Self {
        Self { topic, body, attempts: 1, requeue }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Delivery count, starting at 1.
    pub fn attempts(&self) -> u16 {
        self.attempts
    }
}

impl Delivery for LineDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn ack(self) {
        tracing::debug!(topic = %self.topic, attempts = self.attempts, "message acknowledged");
    }

    fn fail(self) {
        if self.attempts >= self.requeue.max_attempts {
            tracing::warn!(
                topic = %self.topic,
                attempts = self.attempts,
                "giving up on message after max attempts"
            );
            return;
        }

        let Self { topic, body, attempts, requeue } = self;
        tracing::debug!(%topic, attempts, delay = ?requeue.delay, "requeueing message");

        // Waits for queue space like any other producer.
        tokio::spawn(async move {
            tokio::time::sleep(requeue.delay).await;
            let tx = requeue.tx.clone();
            let next = LineDelivery { topic, body, attempts: attempts + 1, requeue };
            if tx.send(next).await.is_err() {
                tracing::warn!("route closed before requeued message was redelivered");
            }
        });
    }

    fn discard(self) {
        tracing::warn!(topic = %self.topic, attempts = self.attempts, "message discarded");
    }
}
