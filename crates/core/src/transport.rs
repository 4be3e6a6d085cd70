//! Contracts between the dedup pipeline and the message transport.
//!
//! The queue connection is always injected, so the pipeline can run against
//! nsqd in production and against in-memory fakes in tests.

use crate::{Error, Request};

/// Terminal state of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Processed; acknowledge.
    Success,
    /// Transient failure; redeliver later.
    Retry,
    /// Never processable; drop without redelivery.
    Discard,
}

impl From<&Error> for Outcome {
    fn from(err: &Error) -> Self {
        if err.is_retryable() { Outcome::Retry } else { Outcome::Discard }
    }
}

/// Outbound side of the transport.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Forward `request` to `topic`.
    async fn publish(&self, topic: &str, request: &Request) -> Result<(), Error>;
}

/// One inbound message and its acknowledgement handle.
///
/// The settling methods consume the delivery, so a message is acknowledged
/// exactly once.
pub trait Delivery: Send + Sized {
    /// Raw message body.
    fn body(&self) -> &[u8];

    /// Processing finished.
    fn ack(self);

    /// Processing failed; redeliver later.
    fn fail(self);

    /// Drop the message for good.
    fn discard(self);

    /// Settle according to a pipeline outcome.
    fn settle(self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.ack(),
            Outcome::Retry => self.fail(),
            Outcome::Discard => self.discard(),
        }
    }
}

/// Inbound side of the transport: the message stream of one route.
///
/// Clones share the stream, so each worker of a route holds one.
#[async_trait::async_trait]
pub trait Subscription: Clone + Send + Sync + 'static {
    type Delivery: Delivery + 'static;

    /// Topic this subscription reads.
    fn topic(&self) -> &str;

    /// Next delivery, or `None` once the stream has ended.
    async fn next(&self) -> Option<Self::Delivery>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorded {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Delivery for Recorded {
        fn body(&self) -> &[u8] {
            b"{}"
        }

        fn ack(self) {
            self.calls.lock().unwrap().push("ack");
        }

        fn fail(self) {
            self.calls.lock().unwrap().push("fail");
        }

        fn discard(self) {
            self.calls.lock().unwrap().push("discard");
        }
    }

    #[test]
    fn test_settle_maps_outcomes() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        for outcome in [Outcome::Success, Outcome::Retry, Outcome::Discard] {
            Recorded { calls: calls.clone() }.settle(outcome);
        }
        assert_eq!(*calls.lock().unwrap(), vec!["ack", "fail", "discard"]);
    }

    #[test]
    fn test_outcome_from_error() {
        assert_eq!(Outcome::from(&Error::Decode("bad".into())), Outcome::Discard);
        assert_eq!(Outcome::from(&Error::Publish("down".into())), Outcome::Retry);

        let reclaim = Error::Reclamation { key: "k".into(), source: Box::new(Error::Publish("down".into())) };
        assert_eq!(Outcome::from(&reclaim), Outcome::Discard);
    }
}
