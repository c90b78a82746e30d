//! `reqwest`-backed HTTP transport.

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ApolloError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// HTTP transport built on a single pooled `reqwest::Client`.
///
/// Cloning is cheap and clones share the connection pool.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::transport::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> apollo_watch::error::Result<()> {
/// let transport = ReqwestTransport::builder()
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_pool_max_idle_per_host(8)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new builder for constructing a transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApolloError::Transport(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApolloError::Transport(format!("Invalid header value: {}", e)))?;
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> ApolloError {
    if err.is_timeout() {
        ApolloError::Timeout(timeout)
    } else {
        ApolloError::Transport(err.to_string())
    }
}

/// Builder for constructing a `ReqwestTransport`.
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    user_agent: String,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: usize::MAX,
            user_agent: concat!("apollo-watch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set the TCP connect timeout.
    ///
    /// Default is 5 seconds. The total request budget is set per request.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Cap the number of idle pooled connections per host.
    pub fn with_pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ReqwestTransport> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| ApolloError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ReqwestTransport { client })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let transport = ReqwestTransport::builder()
            .with_connect_timeout(Duration::from_secs(1))
            .with_pool_max_idle_per_host(2)
            .with_user_agent("test-agent")
            .build();
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/configs/A1/default/app.yml")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let transport = ReqwestTransport::builder().build().unwrap();
        let response = transport
            .get(HttpRequest::get(
                format!("{}/configs/A1/default/app.yml", server.url()),
                Duration::from_secs(5),
            ))
            .await
            .unwrap();

        assert_eq!(response, HttpResponse::new(500, "boom"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_headers_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/x")
            .match_header("Authorization", "Apollo A1:sig")
            .match_header("Timestamp", "1700000000000")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let transport = ReqwestTransport::builder().build().unwrap();
        let request = HttpRequest::get(format!("{}/x", server.url()), Duration::from_secs(5))
            .with_headers(vec![
                ("Authorization".to_string(), "Apollo A1:sig".to_string()),
                ("Timestamp".to_string(), "1700000000000".to_string()),
            ]);

        let response = transport.get(request).await.unwrap();
        assert_eq!(response.status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_failure_maps_to_transport_error() {
        let transport = ReqwestTransport::builder()
            .with_connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        // Port 9 (discard) is almost never listening locally.
        let result = transport
            .get(HttpRequest::get(
                "http://127.0.0.1:9/configs",
                Duration::from_secs(1),
            ))
            .await;

        assert!(matches!(
            result,
            Err(ApolloError::Transport(_)) | Err(ApolloError::Timeout(_))
        ));
    }
}
