//! `rangefetch get`: download one URL to a file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rangefetch_core::download::{
    DownloadEngine, DownloadOptions, HashVerifier, RetryPolicy, save_stream,
};
use tracing::{debug, info, warn};
use url::Url;

use super::{build_client, build_target};
use crate::app_config::FileConfig;
use crate::cli::GetArgs;

/// Fallback file name when the URL path has no usable last segment.
const FALLBACK_FILE_NAME: &str = "download.bin";

pub async fn run_get_command(args: GetArgs, quiet: bool, file: Option<&FileConfig>) -> Result<()> {
    let options = resolve_options(&args, file);
    debug!(?options, "effective download options");

    let engine = DownloadEngine::new(build_client(file)?, options)
        .context("Invalid download options")?;
    let target = build_target(&args.url, &args.transport, file)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(target.url()));

    let stream = engine
        .download(&target)
        .await
        .with_context(|| format!("Failed to start download of {}", args.url))?;

    let cancel = stream.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling download");
            cancel.cancel();
        }
    });

    let progress = progress_bar(stream.expected_size(), quiet);
    let tracker = progress.clone();
    let tracked = stream.inspect(move |item| {
        if let Ok(bytes) = item {
            tracker.inc(bytes.len() as u64);
        }
    });

    let saved = match args.checksum {
        Some(expected) => {
            let algorithm = expected.algorithm();
            let verified = HashVerifier::new(tracked, target.url_str(), expected);
            let written = save_stream(verified, &output).await;
            if written.is_ok() {
                info!(%algorithm, "checksum verified");
            }
            written
        }
        None => save_stream(tracked, &output).await,
    };
    progress.finish_and_clear();

    let written =
        saved.with_context(|| format!("Failed to download {} to {}", args.url, output.display()))?;
    if !quiet {
        println!("Saved {} ({written} bytes)", output.display());
    }
    Ok(())
}

/// Merges command-line values, file values and defaults, in that priority.
fn resolve_options(args: &GetArgs, file: Option<&FileConfig>) -> DownloadOptions {
    let defaults = DownloadOptions::default();
    let file = file.cloned().unwrap_or_default();

    let max_attempts = args
        .max_retries
        .map(u32::from)
        .or(file.max_retries)
        .unwrap_or_else(|| defaults.retry_policy.max_attempts());

    DownloadOptions {
        worker_count: args
            .workers
            .map(usize::from)
            .or(file.worker_count)
            .unwrap_or(defaults.worker_count),
        max_concurrent_fetches: args
            .jobs
            .map(usize::from)
            .or(file.max_concurrent_fetches)
            .unwrap_or(defaults.max_concurrent_fetches),
        chunk_read_size: args
            .chunk_size
            .and_then(|size| usize::try_from(size).ok())
            .or(file.chunk_read_size)
            .unwrap_or(defaults.chunk_read_size),
        timeout: args
            .timeout
            .or(file.timeout_secs)
            .map(Duration::from_secs),
        retry_policy: RetryPolicy::with_max_attempts(max_attempts),
        ..defaults
    }
}

/// Derives a file name from the URL's last path segment, sanitized for the file system.
fn default_output_path(url: &Url) -> PathBuf {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_file_name)
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
    PathBuf::from(name)
}

fn sanitize_file_name(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

fn progress_bar(total: Option<u64>, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
            );
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {bytes} {bytes_per_sec}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner
        }
    };
    progress.set_draw_target(ProgressDrawTarget::stderr());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
