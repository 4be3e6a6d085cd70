//! Crawl request payloads.

use serde::Deserialize;

use crate::Error;

/// The only field read from a payload. Everything else is skipped unparsed.
#[derive(Deserialize)]
struct UrlField {
    url: String,
}

/// A crawl request as carried on the queue.
///
/// Only `url` is interpreted here. The payload is kept byte for byte and
/// forwarded as received, so fields owned by other pipeline stages survive
/// untouched, numbers outside `f64` range included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Address to crawl.
    pub url: String,
    payload: Vec<u8>,
}

impl Request {
    /// A request whose payload is just `{"url": ...}`.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let payload = serde_json::json!({ "url": url }).to_string().into_bytes();
        Self { url, payload }
    }

    /// Decode a message body.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the body is not a JSON object with a
    /// non-empty string `url`.
    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        // Derived structs also accept JSON arrays; payloads must be objects.
        if body.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
            return Err(Error::Decode("expected a JSON object".into()));
        }
        let UrlField { url } = serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))?;
        if url.trim().is_empty() {
            return Err(Error::Decode("url cannot be empty".into()));
        }
        Ok(Self { url, payload: body.to_vec() })
    }

    /// The payload as received, for publishing.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_decode_minimal() {
        let request = Request::decode(br#"{"url":"http://www.site.com/a"}"#).unwrap();
        assert_eq!(request.url, "http://www.site.com/a");
        assert_eq!(request.payload(), br#"{"url":"http://www.site.com/a"}"#);
    }

    #[test]
    fn test_opaque_fields_pass_through() {
        let body = json!({
            "url": "https://example.com/page",
            "depth": 3,
            "callbacks": ["parse_listing"],
            "meta": {"referer": "https://example.com/"}
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let request = Request::decode(&raw).unwrap();

        let forwarded: Value = serde_json::from_slice(request.payload()).unwrap();
        assert_eq!(forwarded, body);
    }

    #[test]
    fn test_numbers_beyond_f64_survive_verbatim() {
        let raw = br#"{"url":"http://www.site.com/a","id":123456789012345678901234567890,"score":1e400}"#;
        let request = Request::decode(raw).unwrap();
        assert_eq!(request.url, "http://www.site.com/a");
        assert_eq!(request.payload(), raw);
    }

    #[test]
    fn test_formatting_is_not_rewritten() {
        let raw = b"{ \"depth\" : 1,\n  \"url\" : \"site.com/a\" }";
        assert_eq!(Request::decode(raw).unwrap().payload(), raw);
    }

    #[test]
    fn test_new_builds_url_only_payload() {
        let request = Request::new("http://x");
        let parsed: Value = serde_json::from_slice(request.payload()).unwrap();
        assert_eq!(parsed, json!({"url": "http://x"}));
        assert_eq!(Request::decode(request.payload()).unwrap(), request);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(Request::decode(b"not json"), Err(Error::Decode(_))));
        assert!(matches!(Request::decode(br#"{"href":"x"}"#), Err(Error::Decode(_))));
        assert!(matches!(Request::decode(br#"{"url":42}"#), Err(Error::Decode(_))));
        assert!(matches!(Request::decode(br#"["http://x"]"#), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_url() {
        assert!(matches!(Request::decode(br#"{"url":"  "}"#), Err(Error::Decode(_))));
    }
}
