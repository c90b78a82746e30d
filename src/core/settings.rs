//! Client settings loaded from files and the environment.

use crate::auth::Secret;
use crate::error::Result;
use crate::notify::StormPolicy;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Settings for an [`ApolloClient`](super::ApolloClient).
///
/// Every field has a default, so a settings file only needs the keys it
/// changes. `config_server_url` must be present by the time the client is built.
///
/// ```yaml
/// config_server_url: http://localhost:8080
/// cluster: default
/// client_ip: 10.0.0.7
/// secret:
///   orders: 6a1b0c...
/// long_poll_timeout_secs: 63
/// storm:
///   window: 5
///   max_distinct_instants: 2
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the config server.
    pub config_server_url: Option<String>,
    /// Cluster every request is scoped to.
    pub cluster: String,
    /// IP reported to the server for grey releases.
    pub client_ip: Option<String>,
    /// Signing secret, shared or per application.
    pub secret: Option<Secret>,
    /// Budget for a single config fetch.
    pub fetch_timeout_secs: u64,
    /// Budget for a long poll; longer than the server hold time.
    pub long_poll_timeout_secs: u64,
    /// Budget for the server probe.
    pub probe_timeout_secs: u64,
    /// Failure storm thresholds.
    pub storm: StormPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            config_server_url: None,
            cluster: "default".to_string(),
            client_ip: None,
            secret: None,
            fetch_timeout_secs: 10,
            long_poll_timeout_secs: 63,
            probe_timeout_secs: 5,
            storm: StormPolicy::default(),
        }
    }
}

impl ClientSettings {
    /// Load settings from an optional file, overridden by `PREFIX__FIELD`
    /// environment variables.
    ///
    /// The file format follows its extension (`.yaml`, `.yml`, `.toml`, `.json`).
    /// Nested keys use `__` as well, e.g. `APOLLO__STORM__WINDOW=8`. Environment
    /// keys are lowercased, so per-application secrets belong in the file.
    ///
    /// # Errors
    ///
    /// Returns [`ApolloError::Settings`](crate::error::ApolloError::Settings) if
    /// the file cannot be read or a value has the wrong type.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use apollo_watch::core::ClientSettings;
    /// use std::path::Path;
    ///
    /// # fn example() -> apollo_watch::error::Result<()> {
    /// // APOLLO__CONFIG_SERVER_URL=http://apollo:8080 overrides the file
    /// let settings = ClientSettings::load(Some(Path::new("apollo.yaml")), Some("APOLLO"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(file: Option<&Path>, env_prefix: Option<&str>) -> Result<Self> {
        Self::load_with_env(file, env_prefix, None)
    }

    fn load_with_env(
        file: Option<&Path>,
        env_prefix: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            debug!(path = %path.display(), "loading settings file");
            builder = builder.add_source(File::from(path).required(true));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .source(env),
            );
        }

        let settings = builder.build()?.try_deserialize::<ClientSettings>()?;
        Ok(settings)
    }

    /// `fetch_timeout_secs` as a duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// `long_poll_timeout_secs` as a duration.
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }

    /// `probe_timeout_secs` as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
