//! Example watching namespaces of two applications.
//!
//! This example shows how to:
//! - Load client settings from a file and the environment
//! - Watch several applications with one watcher
//! - Read the latest values from the snapshot
//! - Stop on Ctrl-C or on a failure storm
//!
//! Run with:
//! APOLLO__CONFIG_SERVER_URL=http://localhost:8080 RUST_LOG=apollo_watch=debug \
//!     cargo run --example watch_namespaces

use apollo_watch::prelude::*;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings_file = Path::new("apollo.yaml");
    let settings = ClientSettings::load(
        settings_file.exists().then_some(settings_file),
        Some("APOLLO"),
    )?;

    let client = ApolloClient::builder().with_settings(settings).build()?;
    if let Err(e) = client.probe().await {
        eprintln!("warning: {e}");
    }

    let handle = client
        .watcher()
        .app_namespaces("SampleApp", ["application", "app.yml"])
        .app("OtherApp", [("application", -1)])
        .on_change(|change| match &change.config {
            Ok(config) => println!(
                "[{}] {} {:?} -> {}: {}",
                change.app_id,
                change.namespace,
                change.old_notification_id,
                change.new_notification_id,
                config.to_json_string()
            ),
            Err(e) => println!(
                "[{}] {} changed but could not be fetched: {}",
                change.app_id, change.namespace, e
            ),
        })
        .on_raw_response(|raw| println!("[{}] poll answered {}", raw.app_id, raw.status))
        .spawn();

    let snapshot = handle.snapshot().clone();
    let control = handle.control().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
            for app in ["SampleApp", "OtherApp"] {
                println!("{app}: {:?}", snapshot.namespaces(app));
            }
            control.shutdown();
        }
    });

    handle.wait().await
}
