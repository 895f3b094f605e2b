use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// The URL string was empty or whitespace.
    #[error("URL is empty")]
    Empty,
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates the URL of a configured feed.
///
/// Feeds are chosen by the user, so only the shape is checked: non-empty,
/// `http`/`https`, and a host. Local feeds (an intranet planet, a test
/// server) are allowed.
///
/// # Examples
///
/// ```
/// use epistle::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://blog.rust-lang.org/feed.xml").is_ok());
/// assert!(validate_feed_url("http://127.0.0.1:8080/rss").is_ok());
/// assert!(validate_feed_url("ftp://example.com/feed").is_err());
/// assert!(validate_feed_url("").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = parse_http_url(url_str)?;
    if url.host_str().unwrap_or_default().is_empty() {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

/// Validates an article link before handing it to the enrichment service.
///
/// Article links come from third-party feed content, so on top of the
/// checks in [`validate_feed_url`] this rejects anything that would make the
/// reader proxy touch an internal network:
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Examples
///
/// ```
/// use epistle::util::validate_url;
///
/// let url = validate_url("https://example.com/post/1").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_feed_url(url_str)?;

    let ip = match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost);
        }
        Some(Host::Ipv4(v4)) => IpAddr::V4(v4),
        Some(Host::Ipv6(v6)) => IpAddr::V6(v6),
        _ => return Ok(url),
    };

    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_internal(&ip) {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    Ok(url)
}

fn parse_http_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            v6.is_unspecified() || first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80
        }
    }
}
