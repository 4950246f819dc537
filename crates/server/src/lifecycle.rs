//! Startup lifecycle: shell precache (install) and stale-store purge
//! (activate).
//!
//! Install is best-effort: a shell path that cannot be fetched or stored is
//! logged and skipped, and the gateway still comes up. Activation errors
//! propagate; the process must not serve with stale store versions present.

use axum::http::{HeaderMap, Method};
use offgate_client::FetchClient;
use offgate_client::fetch::target_url;
use offgate_core::{Error, StoreDb};
use url::Url;

use crate::capture;

/// Precache the shell manifest into the named store.
///
/// Returns the number of shell paths captured. Per-path failures are
/// logged and skipped; only a store registration failure is an error.
pub async fn install(
    store: &StoreDb, client: &FetchClient, origin: &Url, store_name: &str, manifest: &[String],
) -> Result<u64, Error> {
    store.create_store(store_name).await?;

    let mut cached = 0u64;
    for path in manifest {
        let target = match target_url(origin, path) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("skipping shell path {path:?}: {e}");
                continue;
            }
        };

        match client.get(&target, &HeaderMap::new()).await {
            Ok(resp) if capture::is_capturable(&resp, origin) => {
                let entry = capture::entry_from_response(store_name, &Method::GET, &target, &resp);
                match store.put_entry(&entry).await {
                    Ok(()) => cached += 1,
                    Err(e) => tracing::warn!("failed to store shell path {path}: {e}"),
                }
            }
            Ok(resp) => {
                tracing::warn!("skipping shell path {} (status {})", path, resp.status.as_u16());
            }
            Err(e) => {
                tracing::warn!("failed to precache shell path {path}: {e}");
            }
        }
    }

    tracing::info!(cached, total = manifest.len(), store = store_name, "shell precache complete");
    Ok(cached)
}

/// Register the current store and purge every other version.
///
/// Returns the number of stale stores removed. After this completes the
/// current store is the only one that exists.
pub async fn activate(store: &StoreDb, current: &str) -> Result<u64, Error> {
    store.create_store(current).await?;
    let purged = store.purge_stale_stores(current).await?;
    if purged > 0 {
        tracing::info!(purged, store = current, "purged stale stores");
    }
    Ok(purged)
}
