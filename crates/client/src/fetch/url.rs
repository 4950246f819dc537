//! URL handling for the gateway: upstream origin parsing and request
//! target composition.

/// Error type for URL handling failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse and normalize an upstream origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove any fragment (#...)
pub fn parse_origin(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(mut host) = parsed.host_str() {
        let h = host.to_lowercase();
        host = h.as_str();
        parsed
            .set_host(Some(host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Compose the target URL for an intercepted request: the upstream origin
/// plus the request's path and query, verbatim.
pub fn target_url(origin: &url::Url, path_query: &str) -> Result<url::Url, UrlError> {
    if path_query.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut target = origin.clone();
    match path_query.split_once('?') {
        Some((path, query)) => {
            target.set_path(path);
            target.set_query(Some(query));
        }
        None => {
            target.set_path(path_query);
            target.set_query(None);
        }
    }
    target.set_fragment(None);

    Ok(target)
}

/// Whether two URLs share an origin (scheme, host, port).
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
