//! Streaming integrity verification of downloaded bytes.
//!
//! [`HashVerifier`] wraps any byte stream, passes every buffer through
//! unchanged, and checks the digest once the stream ends. A mismatch is
//! delivered as one extra `Err` item so consumers handle it like any other
//! download failure.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::Stream;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

use super::DownloadError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1 (legacy mirrors still publish these).
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase algorithm name as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn hasher(self) -> Hasher {
        match self {
            Self::Sha1 => Hasher::Sha1(Sha1::new()),
            Self::Sha224 => Hasher::Sha224(Sha224::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
            Self::Sha384 => Hasher::Sha384(Sha384::new()),
            Self::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(DownloadError::UnsupportedAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// A digest the downloaded bytes must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    algorithm: HashAlgorithm,
    hex: String,
}

impl ExpectedDigest {
    /// Creates an expectation from an algorithm and a hex digest (any case).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidDigest`] if `hex` is not valid hex or
    /// has the wrong length for `algorithm`.
    pub fn new(algorithm: HashAlgorithm, hex: &str) -> Result<Self, DownloadError> {
        let hex = hex.trim();
        let decoded = hex::decode(hex).map_err(|e| DownloadError::InvalidDigest {
            value: hex.to_string(),
            reason: e.to_string(),
        })?;
        if decoded.len() != algorithm.output_len() {
            return Err(DownloadError::InvalidDigest {
                value: hex.to_string(),
                reason: format!(
                    "{algorithm} digests are {} hex characters, got {}",
                    algorithm.output_len() * 2,
                    hex.len()
                ),
            });
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Parses `ALG:HEX` (e.g. `sha256:9f86...`). A bare hex digest means SHA-256.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnsupportedAlgorithm`] for unknown algorithm
    /// names, or [`DownloadError::InvalidDigest`] for a malformed digest.
    ///
    /// # Example
    ///
    /// ```
    /// use rangefetch_core::download::{ExpectedDigest, HashAlgorithm};
    ///
    /// let digest = ExpectedDigest::parse(
    ///     "SHA256:2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824",
    /// ).unwrap();
    /// assert_eq!(digest.algorithm(), HashAlgorithm::Sha256);
    /// assert!(digest.hex().starts_with("2cf24dba"));
    /// ```
    pub fn parse(value: &str) -> Result<Self, DownloadError> {
        match value.split_once(':') {
            Some((algorithm, hex)) => Self::new(algorithm.parse()?, hex),
            None => Self::new(HashAlgorithm::default(), value),
        }
    }

    /// Algorithm to hash with.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Expected digest, lowercase hex.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl FromStr for ExpectedDigest {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Running digest state, one variant per algorithm.
#[derive(Clone)]
enum Hasher {
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha224(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hasher")
    }
}

/// Hashes a byte stream as it passes through and checks the result at the end.
///
/// Errors from the wrapped stream are forwarded as-is and end verification.
#[derive(Debug)]
pub struct HashVerifier<S> {
    inner: S,
    url: String,
    expected: ExpectedDigest,
    hasher: Option<Hasher>,
    bytes_hashed: u64,
    finished: bool,
}

impl<S> HashVerifier<S> {
    /// Wraps `inner`; `url` names the resource in a mismatch error.
    pub fn new(inner: S, url: impl Into<String>, expected: ExpectedDigest) -> Self {
        let hasher = expected.algorithm().hasher();
        Self {
            inner,
            url: url.into(),
            expected,
            hasher: Some(hasher),
            bytes_hashed: 0,
            finished: false,
        }
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// The digest being checked against.
    pub fn expected(&self) -> &ExpectedDigest {
        &self.expected
    }
}

impl<S> Stream for HashVerifier<S>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(bytes)) => {
                if let Some(hasher) = this.hasher.as_mut() {
                    hasher.update(&bytes);
                    this.bytes_hashed += bytes.len() as u64;
                }
                Poll::Ready(Some(Ok(bytes)))
            }
            Some(Err(error)) => {
                this.finished = true;
                this.hasher = None;
                Poll::Ready(Some(Err(error)))
            }
            None => {
                this.finished = true;
                let Some(hasher) = this.hasher.take() else {
                    return Poll::Ready(None);
                };
                let actual = hasher.finalize_hex();
                if actual.eq_ignore_ascii_case(this.expected.hex()) {
                    debug!(
                        algorithm = this.expected.algorithm().name(),
                        bytes = this.bytes_hashed,
                        "digest verified"
                    );
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(DownloadError::HashMismatch {
                        url: this.url.clone(),
                        algorithm: this.expected.algorithm().name(),
                        expected: this.expected.hex().to_string(),
                        actual,
                    })))
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    // sha256("hello")
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    // sha1("hello")
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn hello_parts() -> impl Stream<Item = Result<Bytes, DownloadError>> + Unpin {
        stream::iter(vec![
            Ok(Bytes::from_static(b"he")),
            Ok(Bytes::from_static(b"l")),
            Ok(Bytes::from_static(b"lo")),
        ])
    }

    async fn drain<S>(mut stream: S) -> (Vec<u8>, Option<DownloadError>)
    where
        S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
    {
        let mut data = Vec::new();
        let mut error = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) => error = Some(e),
            }
        }
        (data, error)
    }

    #[tokio::test]
    async fn test_matching_digest_passes_bytes_unchanged() {
        let expected = ExpectedDigest::new(HashAlgorithm::Sha256, HELLO_SHA256).unwrap();
        let (data, error) = drain(HashVerifier::new(hello_parts(), "u", expected)).await;
        assert_eq!(data, b"hello");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_uppercase_expected_digest_matches() {
        let expected = ExpectedDigest::parse(&format!("sha1:{}", HELLO_SHA1.to_uppercase())).unwrap();
        let (_, error) = drain(HashVerifier::new(hello_parts(), "u", expected)).await;
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_mismatch_is_final_item() {
        let wrong = "0".repeat(64);
        let expected = ExpectedDigest::new(HashAlgorithm::Sha256, &wrong).unwrap();
        let (data, error) = drain(HashVerifier::new(hello_parts(), "u", expected)).await;
        assert_eq!(data, b"hello");
        match error {
            Some(DownloadError::HashMismatch {
                algorithm,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(algorithm, "sha256");
                assert_eq!(expected, wrong);
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through_without_verdict() {
        let inner = stream::iter(vec![
            Ok(Bytes::from_static(b"he")),
            Err(DownloadError::cancelled("u")),
        ]);
        let expected = ExpectedDigest::new(HashAlgorithm::Sha256, HELLO_SHA256).unwrap();
        let mut verifier = HashVerifier::new(inner, "u", expected);
        assert!(verifier.next().await.unwrap().is_ok());
        assert!(matches!(
            verifier.next().await,
            Some(Err(DownloadError::Cancelled { .. }))
        ));
        assert!(verifier.next().await.is_none());
    }

    #[test]
    fn test_parse_algorithms() {
        assert_eq!("SHA-512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!("sha224".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha224);
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(DownloadError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_parse_bare_hex_defaults_to_sha256() {
        let digest = ExpectedDigest::parse(HELLO_SHA256).unwrap();
        assert_eq!(digest.algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_digest_length_checked() {
        assert!(matches!(
            ExpectedDigest::new(HashAlgorithm::Sha256, HELLO_SHA1),
            Err(DownloadError::InvalidDigest { .. })
        ));
        assert!(matches!(
            ExpectedDigest::parse("sha256:not-hex"),
            Err(DownloadError::InvalidDigest { .. })
        ));
    }
}
