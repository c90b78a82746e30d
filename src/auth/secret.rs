//! Access key secrets, either shared or per application.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Secret used to sign requests.
///
/// Deserializes from either a plain string or a table of `appId = secret`
/// pairs, so both of these settings files are accepted:
///
/// ```toml
/// secret = "shared-secret"
/// ```
///
/// ```toml
/// [secret]
/// orders = "orders-secret"
/// billing = "billing-secret"
/// ```
///
/// # Examples
///
/// ```rust
/// use apollo_watch::auth::Secret;
///
/// let shared = Secret::single("s3cr3t");
/// assert_eq!(shared.for_app("any-app"), Some("s3cr3t"));
///
/// let per_app = Secret::per_app([("orders", "o-secret")]);
/// assert_eq!(per_app.for_app("orders"), Some("o-secret"));
/// assert_eq!(per_app.for_app("billing"), None);
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    /// One secret for every application.
    Single(String),
    /// A secret per application id.
    PerApp(HashMap<String, String>),
}

impl Secret {
    /// Create a secret shared by all applications.
    pub fn single(secret: impl Into<String>) -> Self {
        Self::Single(secret.into())
    }

    /// Create a per-application secret mapping.
    pub fn per_app<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::PerApp(
            entries
                .into_iter()
                .map(|(app, secret)| (app.into(), secret.into()))
                .collect(),
        )
    }

    /// Resolve the secret to use for `app_id`.
    ///
    /// Empty secrets resolve to `None` so that no header is attached.
    pub fn for_app(&self, app_id: &str) -> Option<&str> {
        let secret = match self {
            Self::Single(secret) => Some(secret.as_str()),
            Self::PerApp(map) => map.get(app_id).map(String::as_str),
        };
        secret.filter(|s| !s.is_empty())
    }

    /// Add or replace the secret for one application.
    ///
    /// A `Single` secret is converted into a mapping; the shared secret is lost.
    pub fn insert(&mut self, app_id: impl Into<String>, secret: impl Into<String>) {
        match self {
            Self::PerApp(map) => {
                map.insert(app_id.into(), secret.into());
            }
            Self::Single(_) => {
                *self = Self::per_app([(app_id.into(), secret.into())]);
            }
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Secret::Single(<redacted>)"),
            Self::PerApp(map) => {
                let mut apps: Vec<&String> = map.keys().collect();
                apps.sort();
                f.debug_tuple("Secret::PerApp").field(&apps).finish()
            }
        }
    }
}
