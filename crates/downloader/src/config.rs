//! Environment-derived download configuration.
//!
//! Read once at startup into a [`DownloadConfig`] owned by the manager;
//! nothing here is consulted ambiently afterwards. The byte ceiling can
//! be given either as an absolute value or as a GiB multiple, with the
//! absolute value winning when both are set.

use std::time::Duration;

/// Per-request network timeout override (seconds).
pub const ENV_TIMEOUT: &str = "MODELBAY_DOWNLOAD_TIMEOUT";
/// Absolute download byte ceiling.
pub const ENV_MAX_BYTES: &str = "MODELBAY_DOWNLOAD_MAX_BYTES";
/// Download byte ceiling as a (possibly fractional) GiB multiple.
pub const ENV_MAX_GB: &str = "MODELBAY_DOWNLOAD_MAX_GB";
/// In-memory job retention window override (hours).
pub const ENV_RETENTION_HOURS: &str = "MODELBAY_JOB_RETENTION_HOURS";

/// Hugging Face token environment fallbacks, checked in order.
pub const HF_TOKEN_ENV_VARS: &[&str] =
    &["HUGGINGFACE_HUB_TOKEN", "HF_TOKEN", "HUGGINGFACE_TOKEN"];

/// Default per-request timeout. Large model files take a while.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default download byte ceiling (50 GiB).
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024 * 1024;

/// Default in-memory job retention (hours).
pub const DEFAULT_RETENTION_HOURS: i64 = 1;

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Per-request network timeout.
    pub timeout: Duration,
    /// Hard ceiling on downloaded bytes per item, both declared and
    /// measured.
    pub max_bytes: u64,
    /// How long finished jobs stay queryable in memory.
    pub retention_hours: i64,
    /// Bearer credential used for trusted hosts when an item carries
    /// none of its own. Never persisted or logged.
    pub fallback_token: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            retention_hours: DEFAULT_RETENTION_HOURS,
            fallback_token: None,
        }
    }
}

impl DownloadConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok();
        Self {
            timeout: Duration::from_secs(parse_timeout_secs(env(ENV_TIMEOUT).as_deref())),
            max_bytes: parse_max_bytes(env(ENV_MAX_BYTES).as_deref(), env(ENV_MAX_GB).as_deref()),
            retention_hours: parse_retention_hours(env(ENV_RETENTION_HOURS).as_deref()),
            fallback_token: HF_TOKEN_ENV_VARS
                .iter()
                .find_map(|name| env(name).filter(|v| !v.is_empty())),
        }
    }
}

/// Parse the timeout override, falling back to the default on missing
/// or unparsable values.
pub fn parse_timeout_secs(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Parse the byte ceiling: absolute bytes first, then a GiB multiple,
/// then the default. Non-positive and unparsable values are ignored.
pub fn parse_max_bytes(bytes: Option<&str>, gb: Option<&str>) -> u64 {
    if let Some(value) = bytes.and_then(|v| v.parse::<u64>().ok()) {
        if value > 0 {
            return value;
        }
    }
    if let Some(value) = gb.and_then(|v| v.parse::<f64>().ok()) {
        if value > 0.0 {
            return (value * (1u64 << 30) as f64) as u64;
        }
    }
    DEFAULT_MAX_DOWNLOAD_BYTES
}

/// Parse the retention override (hours).
pub fn parse_retention_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(DEFAULT_RETENTION_HOURS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
