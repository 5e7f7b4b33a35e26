//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rangefetch_core::ExpectedDigest;

/// Fast single-file HTTP downloads over parallel byte ranges.
///
/// Rangefetch probes the server for real range support, splits the file into
/// ranges fetched concurrently, and writes them back in order. Servers without
/// range support are downloaded with a single request.
#[derive(Parser, Debug)]
#[command(name = "rangefetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output (including the progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a URL to a file
    Get(GetArgs),
    /// Report a URL's size, range support and content type without downloading
    Probe(ProbeArgs),
}

/// Arguments for `rangefetch get`.
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(clap::Args, Debug, Clone)]
pub struct GetArgs {
    /// URL to download (http or https)
    pub url: String,

    /// Output file (default: last path segment of the URL)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of ranges to split the download into (1-64)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: Option<u16>,

    /// Maximum range requests in flight at once (1-256)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub jobs: Option<u16>,

    /// Largest buffer in bytes when the server cannot serve ranges (1024-16777216)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1024..=16_777_216))]
    pub chunk_size: Option<u32>,

    /// Give up if the whole download takes longer than this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout: Option<u64>,

    /// Maximum attempts per range, including the first (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: Option<u8>,

    /// Expected digest as ALG:HEX (sha1, sha224, sha256, sha384, sha512)
    #[arg(long, value_name = "ALG:HEX")]
    pub checksum: Option<ExpectedDigest>,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Arguments for `rangefetch probe`.
#[derive(clap::Args, Debug, Clone)]
pub struct ProbeArgs {
    /// URL to probe (http or https)
    pub url: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Connection options shared by every subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TransportArgs {
    /// Proxy URL (http://, https://, socks5:// or socks5h://)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Extra request header, repeatable (e.g. -H "Authorization: Bearer abc")
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
