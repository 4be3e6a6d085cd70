//! URL canonicalization into dedup keys.

use std::fmt;

/// Prefixes removed from the front of a URL, in this order.
const STRIPPED_PREFIXES: [&str; 3] = ["http://", "https://", "www."];

/// A normalized URL used as the dedup key.
///
/// Only constructible through [`CacheKey::normalize`], so every key that
/// reaches the cache is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Canonicalize a raw URL.
    ///
    /// Strips `http://`, then `https://`, then `www.`, each only when it
    /// begins the remaining string, and repeats the pass until nothing
    /// changes. A single pass would strip each prefix at most once and map
    /// `www.www.example.com` to `www.example.com`; the repeated pass maps it
    /// to `example.com` so that `normalize(normalize(x)) == normalize(x)`.
    /// Keys differ from the single pass only for such stacked prefixes
    /// (`https://http://x`, `www.www.x`), which real URLs do not carry.
    pub fn normalize(raw: &str) -> Self {
        let mut current = raw;
        loop {
            let next = strip_once(current);
            if next.len() == current.len() {
                return Self(next.to_string());
            }
            current = next;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

fn strip_once(input: &str) -> &str {
    STRIPPED_PREFIXES
        .iter()
        .fold(input, |rest, prefix| rest.strip_prefix(prefix).unwrap_or(rest))
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
