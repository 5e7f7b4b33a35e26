//! Application configuration loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines (a TOML subset): integers,
//! `true`/`false`, and double-quoted strings, with `#` comments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rangefetch_core::download::{
    MAX_CHUNK_READ_SIZE, MAX_CONCURRENT_FETCHES, MAX_WORKER_COUNT, MIN_CHUNK_READ_SIZE,
};

/// Longest accepted timeout of any kind, in seconds (one day).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Largest accepted `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// File configuration for rangefetch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Number of ranges a download is split into.
    pub worker_count: Option<usize>,
    /// Cap on range requests in flight per download.
    pub max_concurrent_fetches: Option<usize>,
    /// Largest buffer emitted when streaming without ranges.
    pub chunk_read_size: Option<usize>,
    /// Overall deadline per download in seconds.
    pub timeout_secs: Option<u64>,
    /// Attempt budget per range.
    pub max_retries: Option<u32>,
    /// Proxy URL (http, https, socks5 or socks5h).
    pub proxy: Option<String>,
    /// Whether TLS certificates are verified.
    pub tls_verify: Option<bool>,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Idle time allowed between reads, in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("worker_count", self.worker_count, 1, MAX_WORKER_COUNT)?;
        validate_range(
            "max_concurrent_fetches",
            self.max_concurrent_fetches,
            1,
            MAX_CONCURRENT_FETCHES,
        )?;
        validate_range(
            "chunk_read_size",
            self.chunk_read_size,
            MIN_CHUNK_READ_SIZE,
            MAX_CHUNK_READ_SIZE,
        )?;
        validate_range("max_retries", self.max_retries, 1, MAX_RETRIES_LIMIT)?;
        validate_range("timeout_secs", self.timeout_secs, 1, MAX_TIMEOUT_SECS)?;
        validate_range(
            "connect_timeout_secs",
            self.connect_timeout_secs,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, MAX_TIMEOUT_SECS)?;

        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        Ok(())
    }
}

fn validate_range<T>(field: &str, value: Option<T>, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = value else {
        return Ok(());
    };
    if value < min || value > max {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/rangefetch/config.toml`
/// 2. `$HOME/.config/rangefetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("rangefetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("rangefetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "worker_count" => {
                cfg.worker_count = Some(parse_integer_usize(value).with_context(invalid)?);
            }
            "max_concurrent_fetches" => {
                cfg.max_concurrent_fetches =
                    Some(parse_integer_usize(value).with_context(invalid)?);
            }
            "chunk_read_size" => {
                cfg.chunk_read_size = Some(parse_integer_usize(value).with_context(invalid)?);
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "proxy" => {
                cfg.proxy = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "tls_verify" => {
                cfg.tls_verify = Some(parse_boolean(value).with_context(invalid)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_usize(raw_value: &str) -> Result<usize> {
    let value = parse_integer_u64(raw_value)?;
    usize::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for usize"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
worker_count = 8
proxy = "socks5h://127.0.0.1:9050"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.worker_count, Some(8));
        assert_eq!(cfg.proxy.as_deref(), Some("socks5h://127.0.0.1:9050"));
        assert!(cfg.max_concurrent_fetches.is_none());
        assert!(cfg.tls_verify.is_none());
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
worker_count = 4
max_concurrent_fetches = 32
chunk_read_size = 131072
timeout_secs = 600
max_retries = 5
proxy = "http://proxy.local:3128"
tls_verify = false
user_agent = "mirror-sync/2.0"
connect_timeout_secs = 10
read_timeout_secs = 120
"#,
        )
        .expect("full config should parse");
        assert_eq!(
            cfg,
            FileConfig {
                worker_count: Some(4),
                max_concurrent_fetches: Some(32),
                chunk_read_size: Some(131_072),
                timeout_secs: Some(600),
                max_retries: Some(5),
                proxy: Some("http://proxy.local:3128".to_string()),
                tls_verify: Some(false),
                user_agent: Some("mirror-sync/2.0".to_string()),
                connect_timeout_secs: Some(10),
                read_timeout_secs: Some(120),
            }
        );
    }

    #[test]
    fn test_parse_config_rejects_invalid_worker_count() {
        let err = parse_config_str("worker_count = 0").expect_err("invalid worker_count expected");
        assert!(
            err.to_string().contains("worker_count"),
            "expected worker_count validation error"
        );

        let err = parse_config_str("worker_count = 65").expect_err("over max expected");
        assert!(err.to_string().contains("1..=64"));
    }

    #[test]
    fn test_parse_config_rejects_small_chunk_read_size() {
        let err = parse_config_str("chunk_read_size = 512").expect_err("below 1 KiB expected");
        assert!(err.to_string().contains("chunk_read_size"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("worker_count = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn test_parse_config_rejects_timeout_too_large_for_u64() {
        let err = parse_config_str("timeout_secs = 18446744073709551616")
            .expect_err("expected out-of-range u64 error");
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_zero_timeouts() {
        for key in ["timeout_secs", "connect_timeout_secs", "read_timeout_secs"] {
            let err = parse_config_str(&format!("{key} = 0")).expect_err("zero timeout rejected");
            assert!(err.to_string().contains(key), "{key}");
        }
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
worker_count = 4 # ranges
user_agent = "agent # with hash" # preferred identity
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.worker_count, Some(4));
        assert_eq!(cfg.user_agent.as_deref(), Some("agent # with hash"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("tls_verify = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("tls_verify"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("proxy = http://x:1").expect_err("unquoted string rejected");
        assert!(err.to_string().contains("proxy"));
    }

    #[test]
    fn test_parse_config_rejects_empty_user_agent() {
        let err = parse_config_str(r#"user_agent = "  ""#).expect_err("empty user agent");
        assert!(err.to_string().contains("user_agent"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("worker_count 4").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_load_file_config_reads_from_disk() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_retries = 2\n").expect("write config");
        let cfg = load_file_config(&path).expect("config should load");
        assert_eq!(cfg.max_retries, Some(2));
    }
}
