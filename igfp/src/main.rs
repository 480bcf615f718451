use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use igfp::{Configuration, MediaCache, MediaPolicy, TokenManager, TokenPolicy};
use instagram_api::Client;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the feed
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    let configuration = Configuration::new()?;
    tracing::info!("Configuration loaded successfully");

    let client = Arc::new(Client::with_base_url(&configuration.instagram.graph_url));
    let tokens = TokenManager::bootstrap(
        client.clone(),
        configuration.instagram.initial_token()?,
        TokenPolicy::from(&configuration),
    )
    .await?;

    let cache = MediaCache::new(
        client,
        Arc::new(tokens),
        MediaPolicy::from(&configuration),
    );

    let snapshot = cache.get().await?;
    tracing::info!(
        items = snapshot.len(),
        fetched_at = %snapshot.fetched_at_utc(),
        "Media feed fetched"
    );

    println!("{}", serde_json::to_string_pretty(&*snapshot)?);

    Ok(())
}
