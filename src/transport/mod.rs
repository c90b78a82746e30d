//! HTTP transport abstraction.
//!
//! The engine never talks HTTP directly. It hands a [`HttpRequest`] to an
//! injected [`HttpTransport`] and interprets the returned [`HttpResponse`].
//! One transport instance (and its connection pool) is shared by every poll
//! loop and fetch.

#[cfg(feature = "reqwest-transport")]
mod reqwest_transport;

#[cfg(feature = "reqwest-transport")]
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder};

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A GET request as issued by the fetcher and the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL including the query string.
    pub url: String,
    /// Extra request headers (authentication).
    pub headers: Vec<(String, String)>,
    /// Total time budget for the request.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Create a GET request with no headers.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    /// Attach headers to the request.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as UTF-8 (may be empty).
    pub body: String,
}

impl HttpResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Trait for HTTP transports.
///
/// Implementations must not treat non-2xx statuses as errors: every status the
/// server sends back is returned as an `Ok(HttpResponse)`. Only failures to
/// complete the exchange (connect errors, timeouts, broken bodies) are `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::get("http://localhost/x", Duration::from_secs(1)).with_headers(
            vec![("Authorization".to_string(), "Apollo A1:sig".to_string())],
        );
        assert_eq!(request.header("authorization"), Some("Apollo A1:sig"));
        assert_eq!(request.header("Timestamp"), None);
    }
}
