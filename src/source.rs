// Flight source endpoints and their validation

use std::fmt;

use url::Url;

use crate::error::SourceError;

const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

// One upstream flight provider, identified by its endpoint URL.
// `raw` is kept verbatim because it doubles as the per-source cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    raw: String,
    url: Url,
}

impl Source {
    pub fn parse(endpoint: &str) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::ConfigurationError {
            endpoint: endpoint.to_string(),
            reason,
        };

        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            return Err(invalid("endpoint is empty".to_string()));
        }
        if trimmed.len() != endpoint.len() || endpoint.chars().any(char::is_whitespace) {
            return Err(invalid("endpoint contains whitespace".to_string()));
        }

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;

        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(invalid("endpoint has no host".to_string())),
        }

        Ok(Self {
            raw: endpoint.to_string(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_absolute_urls() {
        for endpoint in [
            "https://discovery.example.com/source1",
            "http://flights.example.org:8080/v1/list?currency=EUR",
            "ftp://mirror.example.net/flights.json",
            "http://127.0.0.1:3000/flights",
        ] {
            let source = Source::parse(endpoint).unwrap();
            assert_eq!(source.as_str(), endpoint);
        }
    }

    #[test]
    fn test_rejects_malformed_endpoints() {
        for endpoint in [
            "",
            "   ",
            "not a url",
            "example.com/flights",
            "/relative/path",
            "mailto:ops@example.com",
            "file:///etc/flights.json",
            "ws://stream.example.com",
            "https://exa mple.com",
            " https://example.com",
        ] {
            let err = Source::parse(endpoint).unwrap_err();
            assert!(err.is_configuration(), "{endpoint:?} should be rejected, got {err}");
            assert_eq!(err.endpoint(), endpoint);
        }
    }
}
