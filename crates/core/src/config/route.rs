//! `read_topic:write_topic` route pairs.

use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// One inbound topic and the outbound topic its new requests go to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicRoute {
    pub read: String,
    pub write: String,
}

impl FromStr for TopicRoute {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::Invalid {
            field: "topics".into(),
            reason: format!("{s:?}: {reason}"),
        };

        let (read, write) = s.split_once(':').ok_or_else(|| invalid("expected read_topic:write_topic"))?;
        let (read, write) = (read.trim(), write.trim());

        if write.contains(':') {
            return Err(invalid("more than one ':'"));
        }
        if read.is_empty() || write.is_empty() {
            return Err(invalid("topic names must not be empty"));
        }
        if read == write {
            return Err(invalid("read and write topics must differ"));
        }

        Ok(Self { read: read.to_string(), write: write.to_string() })
    }
}

impl fmt::Display for TopicRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.read, self.write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        let route: TopicRoute = "crawl.requests:crawl.scheduled".parse().unwrap();
        assert_eq!(route.read, "crawl.requests");
        assert_eq!(route.write, "crawl.scheduled");
        assert_eq!(route.to_string(), "crawl.requests:crawl.scheduled");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let route: TopicRoute = " in : out ".parse().unwrap();
        assert_eq!(route, TopicRoute { read: "in".into(), write: "out".into() });
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["crawl.requests", ":out", "in:", "a:b:c", "same:same", ""] {
            let result = raw.parse::<TopicRoute>();
            assert!(matches!(result, Err(ConfigError::Invalid { .. })), "{raw:?} should be rejected");
        }
    }
}
