//! Error types for apollo-watch.

use std::time::Duration;

/// Result type alias for apollo-watch operations.
pub type Result<T> = std::result::Result<T, ApolloError>;

/// Errors that can occur when talking to the configuration server.
///
/// The variants fall into three groups:
/// - configuration errors (`InvalidServerUrl`, `InvalidClientIp`, `MissingSetting`,
///   `Settings`), reported once at construction and never retried;
/// - transient errors (`Transport`, `Timeout`, `UnexpectedStatus`, `Deserialization`),
///   which only make a value unavailable for the current round;
/// - `FailureStorm`, which stops every watch loop.
#[derive(Debug, thiserror::Error)]
pub enum ApolloError {
    /// The configured server URL is malformed or uses an unsupported scheme.
    #[error("Invalid config server url: {0}")]
    InvalidServerUrl(String),

    /// The configured client IP is not a valid IPv4 or IPv6 address.
    #[error("Invalid client ip: {0}")]
    InvalidClientIp(String),

    /// A required setting was not provided.
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    /// Failed to load client settings from a file or the environment.
    #[error("Failed to load settings: {0}")]
    Settings(String),

    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The HTTP request did not complete within its budget.
    #[error("HTTP request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a status the caller cannot use.
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the server
        status: u16,
        /// Raw response body, kept for diagnostics
        body: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),

    /// Long-poll failures piled up inside a tight time window.
    #[error(
        "Failure storm for app '{app_id}': {failures} failures within {distinct_instants} distinct second(s), last error: {last_error}"
    )]
    FailureStorm {
        /// Application whose poll loop tripped the guard
        app_id: String,
        /// Number of failures held in the window
        failures: usize,
        /// Number of distinct timestamps among those failures
        distinct_instants: usize,
        /// Display form of the error that filled the window
        last_error: String,
    },

    /// The server root did not answer like a config server.
    #[error("Config server probe failed: {0}")]
    ProbeFailed(String),

    /// Generic error for other cases.
    #[error("Apollo client error: {0}")]
    Other(String),
}

impl ApolloError {
    /// Returns `true` for errors caused by a bad client setup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidServerUrl(_)
                | Self::InvalidClientIp(_)
                | Self::MissingSetting(_)
                | Self::Settings(_)
        )
    }

    /// Returns `true` for errors that only affect the current round.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout(_)
                | Self::UnexpectedStatus { .. }
                | Self::Deserialization(_)
        )
    }
}

impl From<serde_json::Error> for ApolloError {
    fn from(err: serde_json::Error) -> Self {
        ApolloError::Deserialization(err.to_string())
    }
}

impl From<config::ConfigError> for ApolloError {
    fn from(err: config::ConfigError) -> Self {
        ApolloError::Settings(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ApolloError::InvalidServerUrl("ftp://x".into()).is_configuration());
        assert!(ApolloError::MissingSetting("config_server_url").is_configuration());
        assert!(ApolloError::Timeout(Duration::from_secs(63)).is_transient());
        assert!(
            ApolloError::UnexpectedStatus {
                status: 500,
                body: String::new()
            }
            .is_transient()
        );

        let storm = ApolloError::FailureStorm {
            app_id: "A1".into(),
            failures: 5,
            distinct_instants: 1,
            last_error: "connection refused".into(),
        };
        assert!(!storm.is_transient());
        assert!(!storm.is_configuration());
    }

    #[test]
    fn test_storm_message_names_app() {
        let storm = ApolloError::FailureStorm {
            app_id: "A1".into(),
            failures: 5,
            distinct_instants: 2,
            last_error: "boom".into(),
        };
        let msg = storm.to_string();
        assert!(msg.contains("'A1'"));
        assert!(msg.contains("boom"));
    }
}
