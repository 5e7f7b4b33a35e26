//! `rangefetch probe`: report what a server says about a URL.

use anyhow::{Context, Result};
use rangefetch_core::download::{DownloadEngine, DownloadOptions};
use serde::Serialize;

use super::{build_client, build_target};
use crate::app_config::FileConfig;
use crate::cli::ProbeArgs;

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    url: &'a str,
    total_size: Option<u64>,
    supports_ranges: bool,
    content_type: Option<String>,
}

pub async fn run_probe_command(args: ProbeArgs, file: Option<&FileConfig>) -> Result<()> {
    let engine = DownloadEngine::new(build_client(file)?, DownloadOptions::default())
        .context("Invalid download options")?;
    let target = build_target(&args.url, &args.transport, file)?;

    let probe = engine
        .probe(&target)
        .await
        .with_context(|| format!("Failed to probe {}", args.url))?;
    let content_type = engine.content_type(&target).await;

    let report = ProbeReport {
        url: target.url_str(),
        total_size: probe.total_size(),
        supports_ranges: probe.supports_ranges(),
        content_type,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(())
}

fn render_text(report: &ProbeReport<'_>) -> String {
    let size = report
        .total_size
        .map_or_else(|| "unknown".to_string(), |size| size.to_string());
    let content_type = report.content_type.as_deref().unwrap_or("unknown");
    format!(
        "url = {}\ntotal_size = {size}\nsupports_ranges = {}\ncontent_type = {content_type}\n",
        report.url, report.supports_ranges
    )
}
