//! Client construction, settings and the shared configuration snapshot.

mod builder;
mod client;
mod settings;
mod snapshot;

pub use builder::ApolloClientBuilder;
pub use client::{
    ApolloClient, FetchMapping, FetchRequest, FetchedNamespace, group_by_app, probe_server_url,
};
pub use settings::ClientSettings;
pub use snapshot::ConfigSnapshot;
