//! Capability probing: content length and verified byte-range support.

use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::client::HttpClient;
use super::target::DownloadTarget;

/// Range requested alongside the HEAD to signal intent to range.
const HEAD_RANGE: &str = "bytes=0-";

/// Minimal range used to verify that the server really honours ranges.
const VERIFY_RANGE: &str = "bytes=0-0";

/// What a server reported about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentProbe {
    total_size: Option<u64>,
    supports_ranges: bool,
}

impl ContentProbe {
    /// Builds a probe result. Range support is dropped when the size is
    /// unknown or zero, since there is nothing to partition.
    #[must_use]
    pub fn new(total_size: Option<u64>, supports_ranges: bool) -> Self {
        Self {
            total_size,
            supports_ranges: supports_ranges && total_size.is_some_and(|size| size > 0),
        }
    }

    /// Result for a resource whose length and range support are unknown.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(None, false)
    }

    /// Total resource length in bytes, when the server reported one.
    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Whether a real ranged request was answered with partial content.
    #[must_use]
    pub fn supports_ranges(&self) -> bool {
        self.supports_ranges
    }
}

/// Probes `target` for its length and whether byte ranges actually work.
///
/// A HEAD request (with `Range: bytes=0-`) supplies the length and the
/// `Accept-Ranges` claim. If the claim is `bytes`, a one-byte ranged GET is
/// sent and only a 206 answer counts as range support; any failure of that
/// GET means "no ranges" rather than an error.
///
/// # Errors
///
/// Returns a transport error if the HEAD request gets no response, and
/// [`DownloadError::HttpStatus`] if it answers 404 or 410. Other non-success
/// HEAD answers degrade to [`ContentProbe::unknown`].
#[instrument(skip(client, target), fields(url = %target.url()))]
pub async fn probe(
    client: &HttpClient,
    target: &DownloadTarget,
) -> Result<ContentProbe, DownloadError> {
    let head = client
        .send_raw(Method::HEAD, target, Some(HEAD_RANGE))
        .await?;
    let status = head.status();

    if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
        return Err(DownloadError::http_status(target.url_str(), status.as_u16()));
    }
    if !status.is_success() {
        warn!(status = status.as_u16(), "HEAD rejected, probing as unknown length");
        return Ok(ContentProbe::unknown());
    }

    let total_size = total_size_from_headers(status, head.headers());
    let advertises_ranges = head
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));

    if !advertises_ranges || !total_size.is_some_and(|size| size > 0) {
        debug!(?total_size, advertises_ranges, "ranges not advertised");
        return Ok(ContentProbe::new(total_size, false));
    }

    // The verified GET is authoritative over what the headers claim.
    let supports_ranges = match client
        .send_raw(Method::GET, target, Some(VERIFY_RANGE))
        .await
    {
        Ok(response) => response.status() == StatusCode::PARTIAL_CONTENT,
        Err(error) => {
            warn!(error = %error, "range verification request failed");
            false
        }
    };

    debug!(?total_size, supports_ranges, "probe complete");
    Ok(ContentProbe::new(total_size, supports_ranges))
}

/// Reads the full resource length, preferring the `Content-Range` total of a
/// partial answer over `Content-Length`.
fn total_size_from_headers(status: StatusCode, headers: &HeaderMap) -> Option<u64> {
    if status == StatusCode::PARTIAL_CONTENT
        && let Some(total) = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
    {
        return Some(total);
    }

    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Parses the total from `bytes <start>-<end>/<total>`; `*` totals yield `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse::<u64>().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_probe_invariant_ranges_require_known_size() {
        assert!(!ContentProbe::new(None, true).supports_ranges());
        assert!(!ContentProbe::new(Some(0), true).supports_ranges());
        assert!(ContentProbe::new(Some(10), true).supports_ranges());
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/12345"), Some(12345));
        assert_eq!(parse_content_range_total("bytes 0-99/*"), None);
        assert_eq!(parse_content_range_total("items 0-1/2"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_total_size_prefers_content_range_on_partial() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1"));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("bytes 0-0/5000"));
        assert_eq!(
            total_size_from_headers(StatusCode::PARTIAL_CONTENT, &headers),
            Some(5000)
        );
        assert_eq!(total_size_from_headers(StatusCode::OK, &headers), Some(1));
    }

    #[test]
    fn test_total_size_absent() {
        assert_eq!(total_size_from_headers(StatusCode::OK, &HeaderMap::new()), None);
    }

    #[test]
    fn test_probe_serializes_for_reporting() {
        let json = serde_json::to_string(&ContentProbe::new(Some(42), true)).unwrap();
        assert_eq!(json, r#"{"total_size":42,"supports_ranges":true}"#);
    }
}
