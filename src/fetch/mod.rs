//! One-shot configuration reads.
//!
//! [`ConfigFetcher`] builds the cached or uncached config URL for a
//! namespace, issues exactly one signed GET and turns the status code into a
//! typed [`FetchOutcome`]. It never retries.

mod endpoints;
mod fetcher;
mod requester;

pub use endpoints::Endpoints;
pub use fetcher::{
    ConfigFetcher, Configurations, FetchOutcome, FetchResult, HttpStatusClass, NamespaceConfig,
};
pub use requester::SignedRequester;
