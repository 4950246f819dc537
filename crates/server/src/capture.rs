//! Capture policy: which fetched responses may be written to the store,
//! and how they become entries.
//!
//! Only successful (status 200), same-origin, GET, http(s) responses are
//! ever captured. Method and scheme are guaranteed by the bypass rules
//! before a fetch reaches this point; status and origin are checked here.
//! A response whose final URL left the upstream origin after redirects is
//! the stand-in for an opaque response: returned to the caller, never
//! stored, because its success cannot be verified against the origin.

use axum::http::{Method, StatusCode};
use offgate_client::FetchResponse;
use offgate_client::fetch::same_origin;
use offgate_core::Entry;
use offgate_core::store::key::compute_entry_key;
use url::Url;

/// Response headers never captured.
///
/// Body-framing headers are wrong after reqwest decompresses the body and
/// axum recomputes the length on replay. Set-Cookie is credential state,
/// not content.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "upgrade",
    "set-cookie",
];

/// Whether a fetched response may be written to the store.
pub fn is_capturable(resp: &FetchResponse, origin: &Url) -> bool {
    resp.status == StatusCode::OK && same_origin(origin, &resp.final_url)
}

/// Build a store entry from a fetched response.
pub fn entry_from_response(store: &str, method: &Method, target: &Url, resp: &FetchResponse) -> Entry {
    let headers = resp
        .headers
        .iter()
        .filter(|(name, _)| !STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Entry {
        store: store.to_string(),
        key: compute_entry_key(method.as_str(), target.as_str()),
        method: method.to_string(),
        url: target.to_string(),
        status: resp.status.as_u16(),
        headers,
        body: resp.bytes.to_vec(),
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}
