//! Remote resource descriptors.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use url::Url;

use super::DownloadError;

/// Proxy schemes the transport can tunnel through.
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Identifies one remote resource and how to reach it.
///
/// A target is immutable once a download starts; the builder methods consume
/// and return `self` so targets are assembled up front.
///
/// # Example
///
/// ```
/// use rangefetch_core::download::DownloadTarget;
///
/// let target = DownloadTarget::new("https://example.com/disk.img")
///     .unwrap()
///     .with_header("Authorization", "Bearer token")
///     .unwrap()
///     .with_proxy("socks5h://127.0.0.1:1080")
///     .unwrap();
/// assert_eq!(target.proxy(), Some("socks5h://127.0.0.1:1080"));
/// ```
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    url: Url,
    headers: HeaderMap,
    proxy: Option<String>,
    tls_verify: bool,
}

impl DownloadTarget {
    /// Creates a target for an `http` or `https` URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] if the URL does not parse, has no
    /// host, or uses another scheme.
    pub fn new(url: &str) -> Result<Self, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(DownloadError::invalid_url(url));
        }
        Ok(Self {
            url: parsed,
            headers: HeaderMap::new(),
            proxy: None,
            tls_verify: true,
        })
    }

    /// Adds a request header sent with every request for this target.
    ///
    /// `Range` is reserved: the downloader sets it on each request itself.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidHeader`] if the name or value is not
    /// valid HTTP, or the name is `Range`.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, DownloadError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| DownloadError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        if header_name == RANGE {
            return Err(DownloadError::InvalidHeader {
                name: name.to_string(),
                reason: "the Range header is managed by the downloader".to_string(),
            });
        }
        let header_value = HeaderValue::from_str(value).map_err(|e| DownloadError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    /// Routes requests through a proxy of the form `scheme://host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`] for unparseable descriptors,
    /// unsupported schemes, or a missing host or port.
    pub fn with_proxy(mut self, proxy: &str) -> Result<Self, DownloadError> {
        validate_proxy(proxy)?;
        self.proxy = Some(proxy.to_string());
        Ok(self)
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub fn with_tls_verify(mut self, tls_verify: bool) -> Self {
        self.tls_verify = tls_verify;
        self
    }

    /// The resource URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The resource URL as a string, used for error context and logging.
    #[must_use]
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Extra request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The proxy descriptor, if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Whether TLS certificates are verified.
    #[must_use]
    pub fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Returns true when the target needs a transport configured differently
    /// from a plain shared client.
    #[must_use]
    pub(crate) fn needs_dedicated_transport(&self) -> bool {
        self.proxy.is_some() || !self.tls_verify
    }
}

fn validate_proxy(proxy: &str) -> Result<(), DownloadError> {
    let parsed =
        Url::parse(proxy).map_err(|e| DownloadError::invalid_proxy(proxy, e.to_string()))?;
    if !PROXY_SCHEMES.contains(&parsed.scheme()) {
        return Err(DownloadError::invalid_proxy(
            proxy,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::invalid_proxy(proxy, "missing host"));
    }
    if parsed.port_or_known_default().is_none() {
        return Err(DownloadError::invalid_proxy(proxy, "missing port"));
    }
    Ok(())
}
