//! Two-tier deduplication cache for crawl requests.
//!
//! This module answers "was this URL scheduled within the retention window?"
//! with:
//!
//! - Key normalization (scheme and `www.` stripped)
//! - A bounded in-memory hot layer for keys added seconds ago
//! - A SQLite-backed durable store with automatic schema migrations
//! - Lazy reclamation of entries found past the TTL

pub mod connection;
pub mod dedup;
pub mod entry;
pub mod hot;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use dedup::{CacheOptions, DedupCache};
pub use hot::HotCache;
pub use key::CacheKey;
pub use store::KvStore;
