//! Test-only upstream application server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::response::Html;
use axum::routing::{get, post};

/// Spawn a small upstream app on an ephemeral local port.
pub async fn spawn_upstream() -> std::net::SocketAddr {
    let counter = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/", get(|| async { Html("<html>shell</html>") }))
        .route("/index.html", get(|| async { Html("<html>index</html>") }))
        .route(
            "/assets/app.js",
            get(|| async { ([(header::CONTENT_TYPE, "application/javascript")], "console.log(1)") }),
        )
        .route(
            "/counted",
            get(move || {
                let counter = counter.clone();
                async move { format!("hit-{}", counter.fetch_add(1, Ordering::SeqCst) + 1) }
            }),
        )
        .route("/api/echo", post(|body: Bytes| async move { body }))
        .route("/gone", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
