//! Upstream HTTP fetch pipeline for the gateway.
//!
//! ### Two paths to the network
//! - [`FetchClient::get`] is the cacheable path: GET the composed target
//!   URL with a forwarded header subset. Any HTTP status is returned as a
//!   response; the caller decides cacheability. `Err` means the network
//!   itself failed (connect, timeout, oversized body).
//! - [`FetchClient::passthrough`] is the bypass path: forward a request
//!   verbatim (any method, body preserved) without store involvement.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod bypass;
pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, Method, StatusCode, header};
use std::time::{Duration, Instant};

pub use bypass::{BypassReason, classify, is_dev_host};
pub use url::{UrlError, parse_origin, same_origin, target_url};

use offgate_core::Error;

/// Request headers never forwarded upstream.
///
/// Host and length are recomputed by reqwest; the rest are hop-by-hop
/// headers that belong to the client connection, not the upstream one.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "accept-encoding",
];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgate/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Static DNS overrides (host -> socket address), equivalent to curl's
    /// `--resolve`. Lets the gateway front an origin whose name is not
    /// resolvable from this machine.
    pub resolve: Vec<(String, std::net::SocketAddr)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offgate/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            resolve: Vec::new(),
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Upstream HTTP client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        for (host, addr) in &config.resolve {
            builder = builder.resolve(host, *addr);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// GET a target URL, returning raw bytes and metadata for any status.
    ///
    /// Forwards a sanitized subset of the intercepted request's headers.
    /// Only network-level failures (connect, timeout, body over the byte
    /// limit) are errors; HTTP error statuses come back as responses.
    pub async fn get(&self, url: &Url, request_headers: &header::HeaderMap) -> Result<FetchResponse, Error> {
        self.send(Method::GET, url, request_headers, None).await
    }

    /// Forward a bypassed request verbatim: any method, body preserved.
    pub async fn passthrough(
        &self, method: Method, url: &Url, request_headers: &header::HeaderMap, body: Bytes,
    ) -> Result<FetchResponse, Error> {
        self.send(method, url, request_headers, Some(body)).await
    }

    async fn send(
        &self, method: Method, url: &Url, request_headers: &header::HeaderMap, body: Option<Bytes>,
    ) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut request = self
            .http
            .request(method, url.as_str())
            .headers(sanitize_request_headers(request_headers));
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::Upstream(format!("network error: {}", e))
            }
        })?;

        let status = response.status();

        let content_length = response.content_length();
        if let Some(len) = content_length
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::Upstream(format!("failed to read response: {}", e))
            }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes, status {})",
            url,
            final_url,
            fetch_ms,
            bytes.len(),
            status.as_u16()
        );

        Ok(FetchResponse { url: url.clone(), final_url, status, content_type, bytes, headers, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn sanitize_request_headers(headers: &header::HeaderMap) -> header::HeaderMap {
    let mut out = header::HeaderMap::new();
    for (name, value) in headers {
        if STRIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
