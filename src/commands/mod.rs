//! CLI command handlers.

mod get;
mod probe;

pub use get::run_get_command;
pub use probe::run_probe_command;

use anyhow::{Context, Result};
use rangefetch_core::download::{ClientConfig, DownloadTarget, HttpClient};
use std::time::Duration;

use crate::app_config::FileConfig;
use crate::cli::TransportArgs;

/// Builds the HTTP client from file settings, falling back to library defaults.
fn build_client(file: Option<&FileConfig>) -> Result<HttpClient> {
    let mut config = ClientConfig::default();
    if let Some(file) = file {
        if let Some(secs) = file.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.read_timeout_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = &file.user_agent {
            config.user_agent.clone_from(user_agent);
        }
    }
    HttpClient::with_config(config).context("Failed to build HTTP client")
}

/// Builds the download target; command-line transport options win over the file.
fn build_target(
    url: &str,
    transport: &TransportArgs,
    file: Option<&FileConfig>,
) -> Result<DownloadTarget> {
    let mut target =
        DownloadTarget::new(url).with_context(|| format!("Invalid download URL '{url}'"))?;

    for (name, value) in &transport.headers {
        target = target
            .with_header(name, value)
            .with_context(|| format!("Invalid header '{name}'"))?;
    }

    let proxy = transport
        .proxy
        .clone()
        .or_else(|| file.and_then(|f| f.proxy.clone()));
    if let Some(proxy) = proxy {
        target = target
            .with_proxy(&proxy)
            .with_context(|| format!("Invalid proxy '{proxy}'"))?;
    }

    let tls_verify = if transport.insecure {
        false
    } else {
        file.and_then(|f| f.tls_verify).unwrap_or(true)
    };
    Ok(target.with_tls_verify(tls_verify))
}
