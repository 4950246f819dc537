//! Axum front end: a catch-all route that feeds every request through the
//! gateway policy.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::gateway::Gateway;
use crate::respond;

/// Build the intercepting router. Every method and path falls through to
/// the gateway; there are no reserved routes that could shadow the
/// upstream application.
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    Router::new().fallback(intercept).with_state(gateway)
}

async fn intercept(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let path_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = match axum::body::to_bytes(body, gateway.body_limit()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("unreadable request body for {}: {}", path_query, e);
            return respond::synthetic(StatusCode::PAYLOAD_TOO_LARGE, "offgate: unreadable request body");
        }
    };

    gateway.handle(parts.method, &path_query, &parts.headers, body).await
}
