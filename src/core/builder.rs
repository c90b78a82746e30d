//! Builder for constructing ApolloClient instances.

use super::client::{ApolloClient, ClientParts};
use super::settings::ClientSettings;
use crate::auth::Secret;
use crate::error::{ApolloError, Result};
use crate::notify::StormPolicy;
use crate::transport::HttpTransport;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::PollMetrics;

/// Builder for constructing an [`ApolloClient`].
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let client = ApolloClient::builder()
///     .with_server_url("http://localhost:8080")
///     .with_cluster("default")
///     .with_client_ip("10.0.0.7")
///     .with_app_secret("orders", "6a1b0c")
///     .with_fetch_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ApolloClientBuilder {
    server_url: Option<String>,
    cluster: String,
    client_ip: Option<String>,
    secret: Option<Secret>,
    transport: Option<Arc<dyn HttpTransport>>,
    fetch_timeout: Duration,
    long_poll_timeout: Duration,
    probe_timeout: Duration,
    storm: StormPolicy,
    #[cfg(feature = "metrics")]
    metrics: Option<PollMetrics>,
}

impl ApolloClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config server base URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the cluster. Defaults to `"default"`.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Report this IP to the server. An empty string clears it.
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        let ip = ip.into();
        self.client_ip = (!ip.is_empty()).then_some(ip);
        self
    }

    /// Sign requests with `secret`.
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Sign requests for `app_id` with `secret`.
    ///
    /// Replaces a previously set shared secret.
    pub fn with_app_secret(mut self, app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        match &mut self.secret {
            Some(existing) => existing.insert(app_id, secret),
            None => self.secret = Some(Secret::per_app([(app_id.into(), secret.into())])),
        }
        self
    }

    /// Use a custom HTTP transport.
    ///
    /// Without one, `build()` creates a [`ReqwestTransport`](crate::transport::ReqwestTransport)
    /// when the `reqwest-transport` feature is enabled.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Budget for a single config fetch. Default 10s.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Budget for a long poll. Default 63s.
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Budget for the server probe. Default 5s.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Failure storm thresholds.
    pub fn with_storm_policy(mut self, policy: StormPolicy) -> Self {
        self.storm = policy;
        self
    }

    /// Apply loaded [`ClientSettings`]. Later `with_*` calls still override.
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        if let Some(url) = settings.config_server_url {
            self.server_url = Some(url);
        }
        self.cluster = settings.cluster;
        self.client_ip = settings.client_ip.filter(|ip| !ip.is_empty());
        if let Some(secret) = settings.secret {
            self.secret = Some(secret);
        }
        self.fetch_timeout = Duration::from_secs(settings.fetch_timeout_secs);
        self.long_poll_timeout = Duration::from_secs(settings.long_poll_timeout_secs);
        self.probe_timeout = Duration::from_secs(settings.probe_timeout_secs);
        self.storm = settings.storm;
        self
    }

    /// Record poll loop metrics on `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(PollMetrics::new(meter));
        self
    }

    /// Validate the settings and build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no server URL was set, or it is not an `http`/`https` URL with a host
    /// - the client IP is not an IPv4 or IPv6 address
    /// - no transport was set and the `reqwest-transport` feature is disabled
    pub fn build(self) -> Result<ApolloClient> {
        let server_url = self
            .server_url
            .ok_or(ApolloError::MissingSetting("config_server_url"))?;
        let server_url = validate_server_url(&server_url)?;

        if let Some(ip) = &self.client_ip {
            ip.parse::<IpAddr>()
                .map_err(|e| ApolloError::InvalidClientIp(format!("{}: {}", ip, e)))?;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        debug!(
            server_url = %server_url,
            cluster = %self.cluster,
            signed = self.secret.is_some(),
            "building client"
        );

        Ok(ApolloClient::from_parts(ClientParts {
            server_url,
            cluster: self.cluster,
            client_ip: self.client_ip,
            secret: self.secret,
            transport,
            fetch_timeout: self.fetch_timeout,
            long_poll_timeout: self.long_poll_timeout,
            probe_timeout: self.probe_timeout,
            storm: self.storm,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }))
    }
}

impl Default for ApolloClientBuilder {
    fn default() -> Self {
        let settings = ClientSettings::default();
        Self {
            server_url: None,
            cluster: settings.cluster.clone(),
            client_ip: None,
            secret: None,
            transport: None,
            fetch_timeout: settings.fetch_timeout(),
            long_poll_timeout: settings.long_poll_timeout(),
            probe_timeout: settings.probe_timeout(),
            storm: settings.storm,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }
}

pub(crate) fn validate_server_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ApolloError::InvalidServerUrl(format!("{}: {}", raw, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApolloError::InvalidServerUrl(format!(
            "{}: scheme must be http or https",
            raw
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ApolloError::InvalidServerUrl(format!("{}: missing host", raw)));
    }

    Ok(trimmed.to_string())
}

#[cfg(feature = "reqwest-transport")]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    let transport = crate::transport::ReqwestTransport::builder().build()?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "reqwest-transport"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    Err(ApolloError::MissingSetting("transport"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    fn scripted() -> Arc<dyn HttpTransport> {
        Arc::new(ScriptedTransport::new())
    }

    #[test]
    fn test_missing_server_url() {
        let result = ApolloClientBuilder::new().with_transport(scripted()).build();
        assert!(matches!(
            result,
            Err(ApolloError::MissingSetting("config_server_url"))
        ));
    }

    #[test]
    fn test_invalid_server_urls() {
        for url in ["not a url", "ftp://host:21", "localhost:8080", "http://"] {
            let result = ApolloClientBuilder::new()
                .with_server_url(url)
                .with_transport(scripted())
                .build();
            assert!(
                matches!(result, Err(ApolloError::InvalidServerUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ApolloClientBuilder::new()
            .with_server_url("http://localhost:8080//")
            .with_transport(scripted())
            .build()
            .unwrap();
        assert_eq!(client.endpoints().server_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_ip_validation() {
        let bad = ApolloClientBuilder::new()
            .with_server_url("http://localhost:8080")
            .with_client_ip("10.0.0.300")
            .with_transport(scripted())
            .build();
        assert!(matches!(bad, Err(ApolloError::InvalidClientIp(_))));

        for ip in ["10.0.0.7", "::1"] {
            let client = ApolloClientBuilder::new()
                .with_server_url("http://localhost:8080")
                .with_client_ip(ip)
                .with_transport(scripted())
                .build()
                .unwrap();
            assert_eq!(client.endpoints().client_ip(), Some(ip));
        }
    }

    #[test]
    fn test_app_secret_accumulates() {
        let builder = ApolloClientBuilder::new()
            .with_app_secret("A1", "one")
            .with_app_secret("A2", "two");
        let secret = builder.secret.unwrap();
        assert_eq!(secret.for_app("A1"), Some("one"));
        assert_eq!(secret.for_app("A2"), Some("two"));
    }

    #[test]
    fn test_with_settings() {
        let settings = ClientSettings {
            config_server_url: Some("https://apollo.internal".into()),
            cluster: "blue".into(),
            long_poll_timeout_secs: 90,
            storm: StormPolicy {
                window: 8,
                max_distinct_instants: 3,
            },
            ..ClientSettings::default()
        };

        let builder = ApolloClientBuilder::new()
            .with_settings(settings)
            .with_cluster("green");
        assert_eq!(builder.cluster, "green");
        assert_eq!(builder.long_poll_timeout, Duration::from_secs(90));
        assert_eq!(builder.storm.window, 8);

        let client = builder.with_transport(scripted()).build().unwrap();
        assert_eq!(client.endpoints().server_url(), "https://apollo.internal");
        assert_eq!(client.endpoints().cluster(), "green");
    }
}
