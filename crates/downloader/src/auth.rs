//! Bearer-credential handling for downloads.
//!
//! An explicit per-item token wins over the environment fallback, and a
//! credential is attached only when the request host is on the trusted
//! provider allowlist. Arbitrary hosts never see a token.

use modelbay_core::urls::host_of;

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = "modelbay-downloader";

/// Whether a host may receive a bearer credential.
pub fn host_accepts_bearer(host: &str) -> bool {
    host.contains("huggingface.co")
        || host.contains("huggingfaceusercontent.com")
        || host.ends_with("hf.co")
}

/// Pick the bearer token for a request, if any.
///
/// Preference order: explicit item token, then the environment
/// fallback. Returns `None` when no token is available or the host is
/// not trusted.
pub fn bearer_for(url: &str, item_token: Option<&str>, fallback: Option<&str>) -> Option<String> {
    let token = item_token
        .filter(|t| !t.is_empty())
        .or_else(|| fallback.filter(|t| !t.is_empty()))?;
    let host = host_of(url)?;
    host_accepts_bearer(&host).then(|| token.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
