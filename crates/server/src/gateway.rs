//! The gateway request policy.
//!
//! Every intercepted request is resolved through one of these paths:
//!
//! 1. Bypass (non-GET, non-http(s), loopback/dev host): forward natively,
//!    never touching the store.
//! 2. Store hit: replay the stored response, no network call.
//! 3. Store miss: fetch upstream; relay the response and, when it is
//!    capturable, store a copy asynchronously.
//! 4. Network failure: serve the cached shell page for document requests,
//!    otherwise a synthetic 408.
//! 5. Store lookup failure: direct network attempt, then a synthetic 503.
//!
//! Every failure is absorbed here; the handler always returns a response.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::Response;
use offgate_client::FetchClient;
use offgate_client::fetch::{classify, target_url};
use offgate_core::StoreDb;
use offgate_core::store::key::compute_entry_key;
use url::Url;

use crate::capture;
use crate::respond;

/// Shared gateway state: the store, the upstream client, and the policy
/// parameters derived from configuration.
pub struct Gateway {
    store: StoreDb,
    client: FetchClient,
    origin: Url,
    store_name: String,
    shell_fallback: String,
}

impl Gateway {
    pub fn new(store: StoreDb, client: FetchClient, origin: Url, store_name: String, shell_fallback: String) -> Self {
        Self { store, client, origin, store_name, shell_fallback }
    }

    /// Get reference to the store.
    pub fn store(&self) -> &StoreDb {
        &self.store
    }

    /// Request body size limit for the intercepting layer.
    pub fn body_limit(&self) -> usize {
        self.client.config().max_bytes
    }

    /// Resolve one intercepted request to a response.
    pub async fn handle(&self, method: Method, path_query: &str, headers: &HeaderMap, body: Bytes) -> Response {
        let target = match target_url(&self.origin, path_query) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("unusable request target {path_query:?}: {e}");
                return respond::synthetic(StatusCode::BAD_REQUEST, "offgate: unusable request target");
            }
        };

        if let Some(reason) = classify(&method, &target) {
            tracing::debug!(%target, %reason, "bypassing store");
            return match self.client.passthrough(method, &target, headers, body).await {
                Ok(resp) => respond::from_fetch(resp),
                Err(e) => {
                    tracing::warn!(%target, "passthrough failed: {e}");
                    respond::synthetic(StatusCode::BAD_GATEWAY, "offgate: passthrough failed")
                }
            };
        }

        let key = compute_entry_key(method.as_str(), target.as_str());

        match self.store.get_entry(&self.store_name, &key).await {
            Ok(Some(entry)) => {
                tracing::debug!(%target, "store hit");
                respond::from_entry(entry)
            }
            Ok(None) => self.fetch_and_capture(&target, headers).await,
            Err(e) => {
                // Store trouble must not take the page down with it.
                tracing::error!(%target, "store lookup failed: {e}");
                match self.client.get(&target, headers).await {
                    Ok(resp) => respond::from_fetch(resp),
                    Err(e) => {
                        tracing::warn!(%target, "direct network fallback failed: {e}");
                        respond::synthetic(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "offgate: store and upstream unavailable",
                        )
                    }
                }
            }
        }
    }

    async fn fetch_and_capture(&self, target: &Url, headers: &HeaderMap) -> Response {
        match self.client.get(target, headers).await {
            Ok(resp) => {
                if capture::is_capturable(&resp, &self.origin) {
                    let entry = capture::entry_from_response(&self.store_name, &Method::GET, target, &resp);
                    let store = self.store.clone();
                    // Fire-and-forget: the caller already has its response,
                    // a failed write only costs a future cache hit.
                    tokio::spawn(async move {
                        if let Err(e) = store.put_entry(&entry).await {
                            tracing::warn!("failed to capture {}: {}", entry.url, e);
                        }
                    });
                }
                respond::from_fetch(resp)
            }
            Err(e) => {
                tracing::warn!(%target, "upstream fetch failed: {e}");
                if is_document(headers)
                    && let Some(resp) = self.shell_fallback_response().await
                {
                    tracing::debug!(%target, "serving cached shell fallback");
                    return resp;
                }
                respond::synthetic(StatusCode::REQUEST_TIMEOUT, "offgate: upstream unreachable")
            }
        }
    }

    async fn shell_fallback_response(&self) -> Option<Response> {
        let shell = target_url(&self.origin, &self.shell_fallback).ok()?;
        let key = compute_entry_key(Method::GET.as_str(), shell.as_str());
        match self.store.get_entry(&self.store_name, &key).await {
            Ok(Some(entry)) => Some(respond::from_entry(entry)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("shell fallback lookup failed: {e}");
                None
            }
        }
    }
}

/// Whether an intercepted request targets a top-level document.
///
/// Browsers send `Sec-Fetch-Dest: document` for navigations; older callers
/// are classified by an Accept header asking for HTML.
pub fn is_document(headers: &HeaderMap) -> bool {
    if let Some(dest) = headers.get("sec-fetch-dest").and_then(|v| v.to_str().ok()) {
        return dest.eq_ignore_ascii_case("document");
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::spawn_upstream;
    use offgate_client::FetchConfig;
    use offgate_core::Entry;
    use offgate_client::fetch::parse_origin;
    use std::net::SocketAddr;
    use std::time::Duration;

    const STORE: &str = "offgate-cache-v1";

    async fn make_gateway(origin: &str, resolve: Option<(&str, SocketAddr)>) -> Gateway {
        let store = StoreDb::open_in_memory().await.unwrap();
        store.create_store(STORE).await.unwrap();

        let mut config = FetchConfig { timeout: Duration::from_millis(800), ..Default::default() };
        if let Some((host, addr)) = resolve {
            config.resolve.push((host.to_string(), addr));
        }
        let client = FetchClient::new(config).unwrap();

        Gateway::new(store, client, parse_origin(origin).unwrap(), STORE.to_string(), "/".to_string())
    }

    fn seed_entry(origin: &Url, path: &str, body: &[u8]) -> Entry {
        let url = target_url(origin, path).unwrap();
        Entry {
            store: STORE.to_string(),
            key: compute_entry_key("GET", url.as_str()),
            method: "GET".to_string(),
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    async fn body_of(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), 10 * 1024 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    async fn wait_for_entries(store: &StoreDb, name: &str, expected: u64) {
        for _ in 0..100 {
            if store.count_entries(name).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("store never reached {expected} entries");
    }

    #[test]
    fn test_is_document() {
        let mut headers = HeaderMap::new();
        assert!(!is_document(&headers));

        headers.insert(header::ACCEPT, "text/html,application/xhtml+xml".parse().unwrap());
        assert!(is_document(&headers));

        headers.insert("sec-fetch-dest", "image".parse().unwrap());
        assert!(!is_document(&headers));

        headers.insert("sec-fetch-dest", "document".parse().unwrap());
        assert!(is_document(&headers));
    }

    #[tokio::test]
    async fn test_cache_hit_served_without_network() {
        // unroutable origin: any network attempt would fail
        let gateway = make_gateway("http://192.0.2.1:81", None).await;
        gateway.store().put_entry(&seed_entry(&gateway.origin, "/", b"<html>cached</html>")).await.unwrap();

        let resp = gateway.handle(Method::GET, "/", &HeaderMap::new(), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"<html>cached</html>");
    }

    #[tokio::test]
    async fn test_miss_fetches_then_serves_from_store() {
        let addr = spawn_upstream().await;
        let origin = format!("http://app.test:{}", addr.port());
        let gateway = make_gateway(&origin, Some(("app.test", addr))).await;

        let resp = gateway.handle(Method::GET, "/counted", &HeaderMap::new(), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"hit-1");

        wait_for_entries(gateway.store(), STORE, 1).await;

        // the upstream counter advanced, but the reply comes from the store
        let resp = gateway.handle(Method::GET, "/counted", &HeaderMap::new(), Bytes::new()).await;
        assert_eq!(body_of(resp).await, b"hit-1");
    }

    #[tokio::test]
    async fn test_non_200_not_captured() {
        let addr = spawn_upstream().await;
        let origin = format!("http://app.test:{}", addr.port());
        let gateway = make_gateway(&origin, Some(("app.test", addr))).await;

        let resp = gateway.handle(Method::GET, "/gone", &HeaderMap::new(), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.store().count_entries(STORE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_passes_through_uncached() {
        let addr = spawn_upstream().await;
        let origin = format!("http://app.test:{}", addr.port());
        let gateway = make_gateway(&origin, Some(("app.test", addr))).await;

        let resp = gateway
            .handle(Method::POST, "/api/echo", &HeaderMap::new(), Bytes::from_static(b"xin chao"))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"xin chao");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.store().count_entries(STORE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dev_host_passes_through_uncached() {
        let addr = spawn_upstream().await;
        let origin = format!("http://127.0.0.1:{}", addr.port());
        let gateway = make_gateway(&origin, None).await;

        let resp = gateway.handle(Method::GET, "/", &HeaderMap::new(), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.store().count_entries(STORE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_document_failure_serves_cached_shell() {
        let gateway = make_gateway("http://192.0.2.1:81", None).await;
        gateway.store().put_entry(&seed_entry(&gateway.origin, "/", b"<html>shell</html>")).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-dest", "document".parse().unwrap());

        let resp = gateway.handle(Method::GET, "/bao-cao/cong-no", &headers, Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_non_document_failure_synthesizes_408() {
        let gateway = make_gateway("http://192.0.2.1:81", None).await;

        let resp = gateway
            .handle(Method::GET, "/assets/app.js", &HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_document_failure_without_shell_synthesizes_408() {
        let gateway = make_gateway("http://192.0.2.1:81", None).await;

        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-dest", "document".parse().unwrap());

        let resp = gateway.handle(Method::GET, "/bao-cao", &headers, Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
