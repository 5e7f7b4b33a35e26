//! HTTP client wrapper used by the prober and the chunk fetchers.
//!
//! The wrapped `reqwest::Client` owns connection pooling, TLS and proxying.
//! This module only configures it and turns responses into [`DownloadError`]s.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::{Client, Method, Proxy, Response};
use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::target::DownloadTarget;
use crate::user_agent;

/// Transport settings shared by every client built from one [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Longest wait for the next read on a connection. It does not bound the
    /// total request time; that belongs to the download deadline.
    pub read_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
        }
    }
}

/// HTTP client for probing and fetching byte ranges.
///
/// Create one and reuse it across downloads to share its connection pool.
/// Targets that carry a proxy or disable TLS verification get a dedicated
/// client derived from the same [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Creates a client with default timeouts and User-Agent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with explicit transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if reqwest rejects the configuration.
    #[instrument(level = "debug")]
    pub fn with_config(config: ClientConfig) -> Result<Self, DownloadError> {
        let client = base_client_builder(&config)
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self { client, config })
    }

    /// Returns a client suitable for `target`: this one when the target needs
    /// nothing special, otherwise a dedicated client with the target's proxy
    /// and TLS settings.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`] if reqwest rejects the proxy, or
    /// [`DownloadError::Client`] if the client cannot be built.
    #[instrument(level = "debug", skip(self, target), fields(url = %target.url()))]
    pub fn for_target(&self, target: &DownloadTarget) -> Result<Self, DownloadError> {
        if !target.needs_dedicated_transport() {
            return Ok(self.clone());
        }

        let mut builder = base_client_builder(&self.config);
        if let Some(proxy) = target.proxy() {
            let resolved =
                Proxy::all(proxy).map_err(|e| DownloadError::invalid_proxy(proxy, e.to_string()))?;
            builder = builder.proxy(resolved);
            debug!(proxy, "using proxy");
        }
        if !target.tls_verify() {
            debug!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self {
            client,
            config: self.config.clone(),
        })
    }

    /// Sends a request and returns the response regardless of its status.
    ///
    /// # Errors
    ///
    /// Returns a network or read-timeout error if no response arrives.
    pub async fn send_raw(
        &self,
        method: Method,
        target: &DownloadTarget,
        range_header: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let mut request = self
            .client
            .request(method, target.url().clone())
            .headers(target.headers().clone());
        if let Some(range) = range_header {
            request = request.header(RANGE, range);
        }
        request
            .send()
            .await
            .map_err(|e| DownloadError::network(target.url_str(), e))
    }

    /// Sends a request and fails on any non-success status.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] for 4xx/5xx answers, or a
    /// transport error if no response arrives.
    pub async fn send(
        &self,
        method: Method,
        target: &DownloadTarget,
        range_header: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let response = self.send_raw(method, target, range_header).await?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(
                target.url_str(),
                response.status().as_u16(),
            ));
        }
        Ok(response)
    }

    /// Looks up the resource's `Content-Type` with a HEAD request.
    ///
    /// Failures are logged and reported as `None`; the content type is advisory.
    #[instrument(skip(self, target), fields(url = %target.url()))]
    pub async fn content_type(&self, target: &DownloadTarget) -> Option<String> {
        match self.send(Method::HEAD, target, None).await {
            Ok(response) => response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            Err(error) => {
                tracing::warn!(error = %error, "failed to get content type");
                None
            }
        }
    }

    /// Returns the configured transport settings.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn base_client_builder(config: &ClientConfig) -> reqwest::ClientBuilder {
    // Retries are handled by the fetcher; the transport gets none of its own.
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .user_agent(config.user_agent.clone())
}
