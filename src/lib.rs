//! # apollo-watch
//!
//! Long-polling change notification client for Apollo configuration namespaces.
//!
//! ## Overview
//!
//! `apollo-watch` keeps a process's view of remotely managed configuration in
//! sync with an Apollo config server:
//! - One long-poll loop per application, re-fetching exactly the namespaces the
//!   server reports changed
//! - HMAC-SHA1 request signing with shared or per-application secrets
//! - A failure-storm guard that stops every loop when polls fail in a burst
//! - Lock-free reads of the latest fetched namespaces using `arc-swap`
//! - One-shot reads for code that does not need to watch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apollo_watch::prelude::*;
//!
//! # async fn example() -> apollo_watch::error::Result<()> {
//! let client = ApolloClient::builder()
//!     .with_server_url("http://localhost:8080")
//!     .with_app_secret("orders", "6a1b0c")
//!     .build()?;
//!
//! let handle = client
//!     .watcher()
//!     .app_namespaces("orders", ["application", "db.yml"])
//!     .on_change(|change| {
//!         println!(
//!             "{}/{} is now at {}",
//!             change.app_id, change.namespace, change.new_notification_id
//!         );
//!     })
//!     .spawn();
//!
//! // Zero-cost reads from anywhere
//! if let Some(db) = handle.snapshot().get("orders", "db.yml") {
//!     println!("db config: {}", db.to_json_string());
//! }
//!
//! // Returns Err(FailureStorm) if the server keeps failing
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `reqwest-transport` (default): HTTP transport backed by `reqwest`
//! - `metrics`: OpenTelemetry metrics for poll loops
//!
//! Without `reqwest-transport`, supply an [`HttpTransport`](transport::HttpTransport)
//! through [`ApolloClientBuilder::with_transport`](core::ApolloClientBuilder::with_transport).

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod auth;
pub mod core;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod transport;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(test)]
mod test_support;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::auth::Secret;
    pub use crate::core::{
        ApolloClient, ApolloClientBuilder, ClientSettings, ConfigSnapshot, FetchRequest,
        FetchedNamespace,
    };
    pub use crate::error::{ApolloError, Result};
    pub use crate::fetch::{FetchOutcome, NamespaceConfig};
    pub use crate::notify::{
        ConfigChange, Listeners, NotificationState, RawResponse, ScheduleMode, StormPolicy,
        WatchHandle, Watcher,
    };
}
