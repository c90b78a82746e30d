//! The client handle tying fetching and watching together.

use super::builder::{ApolloClientBuilder, validate_server_url};
use crate::auth::Secret;
use crate::core::ConfigSnapshot;
use crate::error::{ApolloError, Result};
use crate::fetch::{ConfigFetcher, Endpoints, FetchOutcome, SignedRequester};
use crate::notify::{
    ConfigChange, Listeners, NotificationState, PollContext, PollLoop, RawResponse, StormPolicy,
    Watcher, system_clock,
};
use crate::transport::{HttpRequest, HttpTransport};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::PollMetrics;

pub(crate) struct ClientParts {
    pub(crate) server_url: String,
    pub(crate) cluster: String,
    pub(crate) client_ip: Option<String>,
    pub(crate) secret: Option<Secret>,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) fetch_timeout: Duration,
    pub(crate) long_poll_timeout: Duration,
    pub(crate) probe_timeout: Duration,
    pub(crate) storm: StormPolicy,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<PollMetrics>,
}

struct ClientInner {
    requester: SignedRequester,
    endpoints: Arc<Endpoints>,
    fetcher: ConfigFetcher,
    long_poll_timeout: Duration,
    probe_timeout: Duration,
    storm: StormPolicy,
    #[cfg(feature = "metrics")]
    metrics: Option<PollMetrics>,
}

/// Client for one config server and cluster.
///
/// Cloning is cheap; clones share the transport and its connection pool.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let client = ApolloClient::builder()
///     .with_server_url("http://localhost:8080")
///     .build()?;
///
/// // One-shot read
/// if let Some(config) = client.fetch_one("orders", "application", true, "").await?.config() {
///     println!("timeout = {:?}", config.get_str("timeout"));
/// }
///
/// // Long-poll for changes until a failure storm or shutdown
/// client
///     .watch(
///         "orders",
///         [("application", -1)],
///         |change| println!("{} changed", change.namespace),
///         None,
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApolloClient {
    inner: Arc<ClientInner>,
}

/// One namespace to read with [`ApolloClient::fetch_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Application id.
    pub app_id: String,
    /// Namespace name.
    pub namespace: String,
    /// Release key already held; empty for none.
    pub release_key: String,
}

impl FetchRequest {
    /// Request a namespace without a release key.
    pub fn new(app_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            namespace: namespace.into(),
            release_key: String::new(),
        }
    }

    /// Send `release_key` so an unchanged namespace answers 304.
    pub fn with_release_key(mut self, release_key: impl Into<String>) -> Self {
        self.release_key = release_key.into();
        self
    }
}

/// Result of one [`FetchRequest`].
#[derive(Debug)]
pub struct FetchedNamespace {
    /// Application id.
    pub app_id: String,
    /// Namespace name.
    pub namespace: String,
    /// Cluster the namespace was read from.
    pub cluster: String,
    /// What the server answered.
    pub outcome: Result<FetchOutcome>,
}

/// Fetch outcomes keyed by `app_id`, then namespace.
pub type FetchMapping = BTreeMap<String, BTreeMap<String, Result<FetchOutcome>>>;

/// Group [`ApolloClient::fetch_many`] results by application and namespace.
///
/// A later result for the same application and namespace replaces an earlier one.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::core::group_by_app;
/// use apollo_watch::prelude::*;
///
/// # async fn example(client: ApolloClient) {
/// let results = client
///     .fetch_many(&[FetchRequest::new("orders", "application")], true)
///     .await;
/// let mapping = group_by_app(results);
/// if let Some(Ok(outcome)) = mapping.get("orders").and_then(|ns| ns.get("application")) {
///     println!("{:?}", outcome.config());
/// }
/// # }
/// ```
pub fn group_by_app<I>(results: I) -> FetchMapping
where
    I: IntoIterator<Item = FetchedNamespace>,
{
    let mut mapping = FetchMapping::new();
    for fetched in results {
        mapping
            .entry(fetched.app_id)
            .or_default()
            .insert(fetched.namespace, fetched.outcome);
    }
    mapping
}

impl ApolloClient {
    /// Create a new builder.
    pub fn builder() -> ApolloClientBuilder {
        ApolloClientBuilder::new()
    }

    pub(crate) fn from_parts(parts: ClientParts) -> Self {
        let endpoints = Arc::new(Endpoints::new(
            parts.server_url,
            parts.cluster,
            parts.client_ip,
        ));
        let requester = SignedRequester::new(parts.transport, parts.secret);
        let fetcher = ConfigFetcher::new(
            requester.clone(),
            Arc::clone(&endpoints),
            parts.fetch_timeout,
        );

        Self {
            inner: Arc::new(ClientInner {
                requester,
                endpoints,
                fetcher,
                long_poll_timeout: parts.long_poll_timeout,
                probe_timeout: parts.probe_timeout,
                storm: parts.storm,
                #[cfg(feature = "metrics")]
                metrics: parts.metrics,
            }),
        }
    }

    /// Server URL, cluster and client IP in use.
    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &ConfigFetcher {
        &self.inner.fetcher
    }

    /// Read one namespace.
    ///
    /// The result distinguishes a present value from "unchanged" (HTTP 304,
    /// only possible with a non-empty `release_key`) and from a failure.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, on any status other than
    /// 200/304, or on a malformed body.
    pub async fn fetch_one(
        &self,
        app_id: &str,
        namespace: &str,
        use_cached_api: bool,
        release_key: &str,
    ) -> Result<FetchOutcome> {
        self.inner
            .fetcher
            .fetch_config(app_id, namespace, use_cached_api, release_key)
            .await
    }

    /// Read several namespaces, one after another in input order.
    ///
    /// A failed entry does not stop the others.
    pub async fn fetch_many(
        &self,
        requests: &[FetchRequest],
        use_cached_api: bool,
    ) -> Vec<FetchedNamespace> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = self
                .fetch_one(
                    &request.app_id,
                    &request.namespace,
                    use_cached_api,
                    &request.release_key,
                )
                .await;
            results.push(FetchedNamespace {
                app_id: request.app_id.clone(),
                namespace: request.namespace.clone(),
                cluster: self.inner.endpoints.cluster().to_string(),
                outcome,
            });
        }
        results
    }

    fn poll_context(&self) -> PollContext {
        PollContext {
            requester: self.inner.requester.clone(),
            endpoints: Arc::clone(&self.inner.endpoints),
            fetcher: self.inner.fetcher.clone(),
            long_poll_timeout: self.inner.long_poll_timeout,
            storm: self.inner.storm,
            clock: system_clock(),
            #[cfg(feature = "metrics")]
            metrics: self.inner.metrics.clone(),
        }
    }

    /// A single poll loop for `app_id`, for callers driving cycles themselves.
    ///
    /// Namespaces re-fetched by the loop are readable through
    /// [`PollLoop::snapshot`].
    pub fn poll_loop(
        &self,
        app_id: impl Into<String>,
        state: NotificationState,
        listeners: Listeners,
    ) -> PollLoop {
        PollLoop::new(
            app_id,
            state,
            self.poll_context(),
            listeners,
            ConfigSnapshot::new(),
        )
    }

    /// Start configuring a watch over one or more applications.
    pub fn watcher(&self) -> Watcher {
        Watcher::new(self.poll_context())
    }

    /// Watch one application until a failure storm.
    ///
    /// `versions` maps each namespace to the notification id already held;
    /// use `-1` for namespaces never seen.
    ///
    /// # Errors
    ///
    /// Returns [`ApolloError::FailureStorm`] when the poll loop gives up.
    pub async fn watch<I, S, F>(
        &self,
        app_id: &str,
        versions: I,
        on_change: F,
        on_raw_response: Option<Box<dyn Fn(&RawResponse) + Send + Sync>>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        let mut watcher = self.watcher().app(app_id, versions).on_change(on_change);
        if let Some(callback) = on_raw_response {
            watcher = watcher.on_raw_response(callback);
        }
        watcher.run().await
    }

    /// Check that the configured server URL answers like a config server.
    ///
    /// # Errors
    ///
    /// Returns [`ApolloError::ProbeFailed`] with a diagnostic otherwise.
    pub async fn probe(&self) -> Result<()> {
        probe_server_url(
            self.inner.requester.transport().as_ref(),
            self.inner.endpoints.server_url(),
            self.inner.probe_timeout,
        )
        .await
    }
}

/// Check that `url` is the root of a config server.
///
/// A config server answers its root with HTTP 404 and a JSON body that
/// carries a `status` field; anything else is reported as a diagnostic.
///
/// # Errors
///
/// Returns [`ApolloError::InvalidServerUrl`] for a malformed URL and
/// [`ApolloError::ProbeFailed`] when the server does not answer as expected.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::core::probe_server_url;
/// use apollo_watch::transport::ReqwestTransport;
/// use std::time::Duration;
///
/// # async fn example() -> apollo_watch::error::Result<()> {
/// let transport = ReqwestTransport::builder().build()?;
/// probe_server_url(&transport, "http://localhost:8080", Duration::from_secs(5)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn probe_server_url(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<()> {
    let url = validate_server_url(url)?;
    debug!(url = %url, "probing config server");

    let response = transport
        .get(HttpRequest::get(url.clone(), timeout))
        .await
        .map_err(|e| ApolloError::ProbeFailed(format!("{} is unreachable: {}", url, e)))?;

    if response.status != 404 {
        warn!(url = %url, status = response.status, "probe got unexpected status");
        return Err(ApolloError::ProbeFailed(format!(
            "server root should answer 404, got {}",
            response.status
        )));
    }

    let body: serde_json::Value = if response.body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null)
    };

    if body.get("status").is_none() {
        return Err(ApolloError::ProbeFailed(format!(
            "response has no status field, body: {}",
            response.body
        )));
    }

    info!(url = %url, "config server probe passed");
    Ok(())
}
