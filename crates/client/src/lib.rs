//! Transport adapters for crawl-cache.
//!
//! This crate provides the nsqd publisher and consumer, plus the
//! line-delimited message source used for local runs and tests.

pub mod nsq;
pub mod source;

pub use nsq::{
    ConsumerSettings, Discovery, NsqConfig, NsqDelivery, NsqError, NsqPublisher, NsqSubscription, validate_channel,
    validate_topic,
};
pub use source::{LineDelivery, LineSource, LineSubscription, SourceError, SourceSettings, SourceStats};
