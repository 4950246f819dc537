//! offgate server entry point.
//!
//! Boots the offline cache gateway: load configuration, open the store,
//! precache the shell manifest (best-effort), purge stale store versions,
//! then serve the intercepting HTTP front end.

use std::sync::Arc;

use anyhow::Result;
use offgate_client::{FetchClient, FetchConfig};
use offgate_client::fetch::parse_origin;
use offgate_core::{AppConfig, StoreDb};
use tracing_subscriber::EnvFilter;

mod capture;
mod gateway;
mod lifecycle;
mod respond;
mod routes;
#[cfg(test)]
mod testutil;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = parse_origin(config.require_upstream()?)?;

    let store = StoreDb::open(&config.db_path).await?;
    let client = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?;

    // Install phase is best-effort: the gateway still comes up offline.
    if let Err(e) = lifecycle::install(&store, &client, &origin, &config.store_name, &config.shell_manifest).await {
        tracing::warn!("shell precache failed: {e}");
    }

    lifecycle::activate(&store, &config.store_name).await?;

    let gateway = Arc::new(gateway::Gateway::new(
        store,
        client,
        origin,
        config.store_name.clone(),
        config.shell_fallback.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("offgate listening on http://{}", listener.local_addr()?);
    axum::serve(listener, routes::build_router(gateway)).await?;

    Ok(())
}
