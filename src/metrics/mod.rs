//! OpenTelemetry metrics for poll loops.
//!
//! Tracked per application (`app_id` attribute):
//! - Long polls issued and failed
//! - Namespaces reported changed
//! - Uncached re-fetch count, failures and duration
//! - Failure storms
//! - Seconds since the last observed change
//!
//! # Examples
//!
//! ```rust,no_run
//! use apollo_watch::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let client = ApolloClient::builder()
//!     .with_server_url("http://localhost:8080")
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod poll_metrics;

pub use poll_metrics::PollMetrics;
