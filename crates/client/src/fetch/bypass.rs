//! Bypass classification for intercepted requests.
//!
//! Requests the gateway must not touch the store for: non-GET methods,
//! non-http(s) schemes, and loopback/development hosts. Bypassed requests
//! are forwarded natively and never read from or written to the store.

use reqwest::Method;
use std::net::IpAddr;
use url::Url;

/// Why a request bypasses the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BypassReason {
    #[error("non-GET method: {0}")]
    Method(String),

    #[error("non-http(s) scheme: {0}")]
    Scheme(String),

    #[error("loopback/development host: {0}")]
    DevHost(String),
}

/// Check if a host is a loopback or development host.
///
/// Covers the hostnames a development server answers on: `localhost` and
/// its subdomains, plus literal loopback and unspecified IP addresses
/// (127.0.0.0/8, ::1, 0.0.0.0, ::).
pub fn is_dev_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if host.eq_ignore_ascii_case("localhost") || host.to_ascii_lowercase().ends_with(".localhost") {
        return true;
    }

    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}

/// Classify a request against the bypass rules.
///
/// Returns the reason to bypass, or None when the request is eligible for
/// store lookup and capture.
pub fn classify(method: &Method, url: &Url) -> Option<BypassReason> {
    if method != Method::GET {
        return Some(BypassReason::Method(method.to_string()));
    }

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Some(BypassReason::Scheme(scheme.to_string())),
    }

    if let Some(host) = url.host_str()
        && is_dev_host(host)
    {
        return Some(BypassReason::DevHost(host.to_string()));
    }

    None
}
