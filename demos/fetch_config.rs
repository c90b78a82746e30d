//! Example reading namespaces once, without watching.
//!
//! Run with:
//! cargo run --example fetch_config -- http://localhost:8080 SampleApp application app.yml

use apollo_watch::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let server = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let app_id = args.next().unwrap_or_else(|| "SampleApp".to_string());
    let mut namespaces: Vec<String> = args.collect();
    if namespaces.is_empty() {
        namespaces.push("application".to_string());
    }

    let client = ApolloClient::builder().with_server_url(server).build()?;

    let requests: Vec<FetchRequest> = namespaces
        .iter()
        .map(|ns| FetchRequest::new(app_id.clone(), ns.clone()))
        .collect();

    println!("=== Cached API ===");
    for fetched in client.fetch_many(&requests, true).await {
        match fetched.outcome {
            Ok(FetchOutcome::Updated(config)) => {
                println!("{}/{}: {}", fetched.app_id, fetched.namespace, config.to_json_string())
            }
            Ok(FetchOutcome::NotModified) => println!("{}: unchanged", fetched.namespace),
            Err(e) => println!("{}: failed: {}", fetched.namespace, e),
        }
    }

    // The uncached API returns a release key; sending it back yields 304
    println!("\n=== Uncached API with release key ===");
    for namespace in &namespaces {
        let first = client.fetch_one(&app_id, namespace, false, "").await?;
        let Some(release_key) = first.config().and_then(|c| c.release_key()) else {
            println!("{namespace}: no release key");
            continue;
        };
        let again = client
            .fetch_one(&app_id, namespace, false, release_key)
            .await?;
        println!("{namespace}: release {release_key}, refetch -> {again:?}");
    }

    Ok(())
}
