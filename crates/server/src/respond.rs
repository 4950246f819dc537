//! Response construction: replaying stored entries, relaying upstream
//! responses, and synthesizing error responses.
//!
//! Every gateway outcome becomes a response through one of these three
//! constructors; nothing here can fail outward.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use offgate_client::FetchResponse;
use offgate_core::Entry;

/// Headers not relayed from a live upstream response.
///
/// reqwest has already decompressed the body, so the framing headers no
/// longer describe what goes on the wire; axum recomputes them.
const STRIPPED_RELAY_HEADERS: &[&str] = &[
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "upgrade",
];

/// Synthesize a minimal error response.
pub fn synthetic(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.to_string(),
    )
        .into_response()
}

/// Relay a live upstream response to the caller.
pub fn from_fetch(resp: FetchResponse) -> Response {
    let mut builder = Response::builder().status(resp.status);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in resp.headers.iter() {
            if STRIPPED_RELAY_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from(resp.bytes))
        .unwrap_or_else(|_| synthetic(StatusCode::BAD_GATEWAY, "offgate: unrelayable upstream response"))
}

/// Replay a stored entry.
pub fn from_entry(entry: Entry) -> Response {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in &entry.headers {
            let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
                continue;
            };
            headers.append(name, value);
        }
    }

    builder
        .body(Body::from(entry.body))
        .unwrap_or_else(|_| synthetic(StatusCode::INTERNAL_SERVER_ERROR, "offgate: unreplayable stored entry"))
}
