//! Download-item validation.
//!
//! A batch of download requests is validated up front; a single invalid
//! item rejects the whole batch before any job state is created. The
//! rules here mirror what the download worker relies on later: bare
//! basenames only, whitelisted weight-file extensions, http(s) URLs with
//! a host, and well-formed checksums.

use serde::Deserialize;

use crate::error::CoreError;
use crate::kinds::ModelKind;
use crate::urls;

/// File extensions accepted for downloaded model weights.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".safetensors", ".ckpt", ".pt", ".pth", ".bin"];

/// An unvalidated download request as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDownloadItem {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub token: String,
}

/// A fully validated download item, safe to hand to the job worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub key: String,
    pub kind: ModelKind,
    pub url: String,
    pub filename: String,
    pub sha256: Option<String>,
    pub token: Option<String>,
}

/// Extract the basename of a path-like value, treating both `/` and `\`
/// as separators.
pub fn basename(value: &str) -> String {
    let normalized = value.replace('\\', "/");
    normalized.rsplit('/').next().unwrap_or("").to_string()
}

/// Check that a value is a 64-character lowercase hex SHA-256 digest.
pub fn is_valid_sha256(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Validate a download URL: http(s) scheme and a non-empty host.
pub fn validate_url(url: &str) -> Result<(), CoreError> {
    if url.is_empty() {
        return Err(CoreError::Validation("url is required".to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(CoreError::Validation(
            "url must start with http or https".to_string(),
        ));
    }
    if urls::host_of(url).is_none() {
        return Err(CoreError::Validation("url must include a host".to_string()));
    }
    Ok(())
}

/// Validate a target filename: non-empty bare basename, no traversal,
/// extension in [`ALLOWED_EXTENSIONS`].
pub fn validate_filename(filename: &str) -> Result<(), CoreError> {
    if filename.is_empty() {
        return Err(CoreError::Validation("filename is required".to_string()));
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains(':') {
        return Err(CoreError::Validation(
            "filename must be a basename".to_string(),
        ));
    }
    if filename.contains("..") {
        return Err(CoreError::Validation(
            "filename contains invalid path".to_string(),
        ));
    }
    let ext = filename
        .rfind('.')
        .map(|i| filename[i..].to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::Validation(format!(
            "unsupported extension '{ext}'"
        )));
    }
    Ok(())
}

/// Validate a raw item into a [`DownloadItem`].
///
/// The filename falls back to the last URL path segment when not given
/// explicitly. Checksums are lowercased; empty optional fields become
/// `None`.
pub fn validate_item(raw: &RawDownloadItem) -> Result<DownloadItem, CoreError> {
    let key = basename(raw.key.trim());
    if key.is_empty() {
        return Err(CoreError::Validation("key is required".to_string()));
    }

    let url = raw.url.trim().to_string();
    validate_url(&url)?;

    let kind = ModelKind::parse_required(&raw.kind)?;

    let filename = {
        let explicit = raw.filename.trim();
        if explicit.is_empty() {
            urls::filename_from_url(&url)
        } else {
            explicit.to_string()
        }
    };
    validate_filename(&filename)?;

    let sha256 = raw.sha256.trim().to_lowercase();
    if !sha256.is_empty() && !is_valid_sha256(&sha256) {
        return Err(CoreError::Validation(
            "sha256 must be 64 hex characters".to_string(),
        ));
    }

    let token = raw.token.trim();

    Ok(DownloadItem {
        key,
        kind,
        url,
        filename,
        sha256: (!sha256.is_empty()).then_some(sha256),
        token: (!token.is_empty()).then(|| token.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
