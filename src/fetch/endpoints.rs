//! URL construction for the config and notification APIs.

use crate::error::{ApolloError, Result};
use crate::notify::Notification;
use url::form_urlencoded;

/// Builds request URLs for one config server and cluster.
///
/// # Examples
///
/// ```rust
/// use apollo_watch::fetch::Endpoints;
///
/// let endpoints = Endpoints::new("http://localhost:8080/", "default", None);
/// assert_eq!(
///     endpoints.config_url("A1", "app.yml", true, ""),
///     "http://localhost:8080/configfiles/json/A1/default/app.yml"
/// );
/// assert_eq!(
///     endpoints.config_url("A1", "app.yml", false, "r1"),
///     "http://localhost:8080/configs/A1/default/app.yml?releaseKey=r1"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    server_url: String,
    cluster: String,
    client_ip: Option<String>,
}

impl Endpoints {
    /// Create endpoints for `server_url` (trailing slashes are trimmed).
    pub fn new(
        server_url: impl Into<String>,
        cluster: impl Into<String>,
        client_ip: Option<String>,
    ) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            server_url,
            cluster: cluster.into(),
            client_ip: client_ip.filter(|ip| !ip.is_empty()),
        }
    }

    /// The config server base URL, without a trailing slash.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// The cluster every URL is scoped to.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The client IP reported to the server, if any.
    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    /// URL for reading one namespace.
    ///
    /// `ip` and `releaseKey` query parameters are appended in that order, each
    /// only when set. No `?` is emitted when neither is present.
    pub fn config_url(
        &self,
        app_id: &str,
        namespace: &str,
        use_cached_api: bool,
        release_key: &str,
    ) -> String {
        let mut url = if use_cached_api {
            format!(
                "{}/configfiles/json/{}/{}/{}",
                self.server_url, app_id, self.cluster, namespace
            )
        } else {
            format!(
                "{}/configs/{}/{}/{}",
                self.server_url, app_id, self.cluster, namespace
            )
        };

        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut has_params = false;
        if let Some(ip) = &self.client_ip {
            query.append_pair("ip", ip);
            has_params = true;
        }
        if !release_key.is_empty() {
            query.append_pair("releaseKey", release_key);
            has_params = true;
        }
        if has_params {
            url.push('?');
            url.push_str(&query.finish());
        }

        url
    }

    /// URL for the long-poll notification API.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification list cannot be encoded as JSON.
    pub fn notifications_url(
        &self,
        app_id: &str,
        notifications: &[Notification],
    ) -> Result<String> {
        let payload = serde_json::to_string(notifications).map_err(|e| {
            ApolloError::Other(format!("Failed to encode notifications: {}", e))
        })?;

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("appId", app_id)
            .append_pair("cluster", &self.cluster)
            .append_pair("notifications", &payload)
            .finish();

        Ok(format!("{}/notifications/v2?{}", self.server_url, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "http://config.local:8080";

    #[test]
    fn test_cached_url_without_params() {
        let endpoints = Endpoints::new(SERVER, "default", None);
        assert_eq!(
            endpoints.config_url("A1", "app.yml", true, ""),
            format!("{SERVER}/configfiles/json/A1/default/app.yml")
        );
    }

    #[test]
    fn test_uncached_url_with_release_key() {
        let endpoints = Endpoints::new(SERVER, "default", None);
        assert_eq!(
            endpoints.config_url("A1", "app.yml", false, "r1"),
            format!("{SERVER}/configs/A1/default/app.yml?releaseKey=r1")
        );
    }

    #[test]
    fn test_ip_precedes_release_key() {
        let endpoints = Endpoints::new(SERVER, "prod", Some("10.0.0.7".to_string()));
        assert_eq!(
            endpoints.config_url("A1", "application", false, "20240101-abc"),
            format!("{SERVER}/configs/A1/prod/application?ip=10.0.0.7&releaseKey=20240101-abc")
        );
        assert_eq!(
            endpoints.config_url("A1", "application", true, ""),
            format!("{SERVER}/configfiles/json/A1/prod/application?ip=10.0.0.7")
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let endpoints = Endpoints::new(format!("{SERVER}//"), "default", None);
        assert_eq!(endpoints.server_url(), SERVER);
    }

    #[test]
    fn test_notifications_url_encodes_payload() {
        let endpoints = Endpoints::new(SERVER, "default", None);
        let url = endpoints
            .notifications_url("A1", &[Notification::new("app.yml", -1)])
            .unwrap();
        assert_eq!(
            url,
            format!(
                "{SERVER}/notifications/v2?appId=A1&cluster=default&notifications=%5B%7B%22namespaceName%22%3A%22app.yml%22%2C%22notificationId%22%3A-1%7D%5D"
            )
        );
    }
}
