//! Core types and shared functionality for crawl-cache.
//!
//! This crate provides:
//! - Two-tier dedup cache with SQLite backend
//! - Crawl request and transport contracts
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod transport;

pub use cache::{CacheDb, CacheKey, CacheOptions, DedupCache, KvStore};
pub use error::Error;
pub use request::Request;
pub use transport::{Delivery, Outcome, Publisher, Subscription};
