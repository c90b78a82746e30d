//! Single-request namespace reads and status interpretation.

use super::{Endpoints, SignedRequester};
use crate::error::{ApolloError, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Key/value configuration of one namespace.
pub type Configurations = serde_json::Map<String, JsonValue>;

/// Coarse classification of the HTTP status of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatusClass {
    /// 200
    Ok,
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 500
    InternalServerError,
    /// 502
    BadGateway,
    /// 503
    ServiceUnavailable,
    /// 504
    GatewayTimeout,
    /// Anything else, including 304.
    Unknown,
}

impl HttpStatusClass {
    /// Classify a status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Ok,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            500 => Self::InternalServerError,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            _ => Self::Unknown,
        }
    }
}

/// Raw status and body of one fetch. Transient; interpret it with
/// [`FetchResult::into_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    status: u16,
    body: Option<String>,
}

impl FetchResult {
    /// Create a result; an empty body is stored as `None`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status,
            body: (!body.is_empty()).then_some(body),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw response body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Classification of the status code.
    pub fn status_class(&self) -> HttpStatusClass {
        HttpStatusClass::from_status(self.status)
    }

    /// Interpret the status and body.
    ///
    /// - `200`: parse the body. The cached API returns the configuration map
    ///   itself; the uncached API nests it under `configurations` next to a
    ///   `releaseKey`.
    /// - `304`: [`FetchOutcome::NotModified`].
    /// - anything else: [`ApolloError::UnexpectedStatus`] carrying the raw body.
    pub fn into_outcome(
        self,
        app_id: &str,
        cluster: &str,
        namespace: &str,
        use_cached_api: bool,
    ) -> Result<FetchOutcome> {
        match self.status {
            200 => {
                let body = self.body.ok_or_else(|| {
                    ApolloError::Deserialization("Empty body on 200 response".to_string())
                })?;
                let (configurations, release_key) = if use_cached_api {
                    (parse_cached_body(&body)?, None)
                } else {
                    parse_uncached_body(&body)?
                };
                Ok(FetchOutcome::Updated(NamespaceConfig {
                    app_id: app_id.to_string(),
                    cluster: cluster.to_string(),
                    namespace: namespace.to_string(),
                    configurations,
                    release_key,
                }))
            }
            304 => Ok(FetchOutcome::NotModified),
            status => Err(ApolloError::UnexpectedStatus {
                status,
                body: self.body.unwrap_or_default(),
            }),
        }
    }
}

/// Typed result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server returned configuration (HTTP 200).
    Updated(NamespaceConfig),
    /// The release key is still current (HTTP 304); keep the cached value.
    NotModified,
}

impl FetchOutcome {
    /// The configuration, if one was returned.
    pub fn config(&self) -> Option<&NamespaceConfig> {
        match self {
            Self::Updated(config) => Some(config),
            Self::NotModified => None,
        }
    }

    /// Consume the outcome, returning the configuration if one was returned.
    pub fn into_config(self) -> Option<NamespaceConfig> {
        match self {
            Self::Updated(config) => Some(config),
            Self::NotModified => None,
        }
    }
}

/// Configuration of one namespace as returned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceConfig {
    app_id: String,
    cluster: String,
    namespace: String,
    configurations: Configurations,
    release_key: Option<String>,
}

impl NamespaceConfig {
    /// Application id the namespace belongs to.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Cluster the namespace was read from.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Namespace name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Release key reported by the uncached API. Always `None` for cached reads.
    pub fn release_key(&self) -> Option<&str> {
        self.release_key.as_deref()
    }

    /// All key/value pairs.
    pub fn configurations(&self) -> &Configurations {
        &self.configurations
    }

    /// Look up a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.configurations.get(key).and_then(JsonValue::as_str)
    }

    /// The configurations serialized back to a JSON object string.
    pub fn to_json_string(&self) -> String {
        JsonValue::Object(self.configurations.clone()).to_string()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncachedBody {
    #[serde(default)]
    configurations: Option<Configurations>,
    #[serde(default)]
    release_key: Option<String>,
}

fn parse_cached_body(body: &str) -> Result<Configurations> {
    match serde_json::from_str::<JsonValue>(body)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ApolloError::Deserialization(
            "Expected JSON object at root level".to_string(),
        )),
    }
}

fn parse_uncached_body(body: &str) -> Result<(Configurations, Option<String>)> {
    let parsed: UncachedBody = serde_json::from_str(body)?;
    Ok((
        parsed.configurations.unwrap_or_default(),
        parsed.release_key.filter(|key| !key.is_empty()),
    ))
}

/// Reads single namespaces through the signed transport.
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
/// match client.fetcher().fetch_config("A1", "application", false, "").await? {
///     FetchOutcome::Updated(config) => println!("{:?}", config.get_str("timeout")),
///     FetchOutcome::NotModified => println!("unchanged"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigFetcher {
    requester: SignedRequester,
    endpoints: Arc<Endpoints>,
    timeout: Duration,
}

impl ConfigFetcher {
    /// Create a fetcher.
    pub fn new(requester: SignedRequester, endpoints: Arc<Endpoints>, timeout: Duration) -> Self {
        Self {
            requester,
            endpoints,
            timeout,
        }
    }

    /// The endpoints this fetcher targets.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue one GET for a namespace and return the raw status and body.
    ///
    /// # Errors
    ///
    /// Returns an error only if the exchange itself failed (connection, timeout).
    pub async fn fetch(
        &self,
        app_id: &str,
        namespace: &str,
        use_cached_api: bool,
        release_key: &str,
    ) -> Result<FetchResult> {
        let url = self
            .endpoints
            .config_url(app_id, namespace, use_cached_api, release_key);
        let response = self.requester.get(app_id, url, self.timeout).await?;
        debug!(app_id, namespace, status = response.status, "fetched namespace");
        Ok(FetchResult::new(response.status, response.body))
    }

    /// Fetch a namespace and interpret the response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, on any status other than 200/304,
    /// or when a 200 body cannot be parsed.
    pub async fn fetch_config(
        &self,
        app_id: &str,
        namespace: &str,
        use_cached_api: bool,
        release_key: &str,
    ) -> Result<FetchOutcome> {
        let result = self
            .fetch(app_id, namespace, use_cached_api, release_key)
            .await?;
        result
            .into_outcome(app_id, self.endpoints.cluster(), namespace, use_cached_api)
            .inspect_err(|e| warn!(app_id, namespace, error = %e, "namespace fetch failed"))
    }
}
