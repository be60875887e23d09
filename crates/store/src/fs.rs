//! Crash-safe JSON persistence primitives.
//!
//! Two read modes exist on purpose: soft caches (recipes, fingerprints)
//! tolerate corruption and fall back to a default, while canonical data
//! must fail loudly instead of silently resetting. Writers always go
//! through a uniquely-named temp file plus an atomic rename.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Maximum size accepted when reading a JSON file (10 MiB).
pub const MAX_JSON_BYTES: u64 = 10 * 1024 * 1024;

/// Read and deserialize a JSON file, strictly.
///
/// Returns `Ok(None)` when the file does not exist. Oversized files,
/// unreadable files, and malformed JSON are all errors.
pub fn read_json_strict<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let size = std::fs::metadata(path)?.len();
    if size > MAX_JSON_BYTES {
        return Err(StoreError::Persistence(format!(
            "JSON file too large ({size} bytes): {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content).map_err(|e| {
        StoreError::Persistence(format!("invalid JSON in {}: {e}", path.display()))
    })?;
    Ok(Some(value))
}

/// Read and deserialize a JSON file, leniently.
///
/// Any failure (missing, oversized, unreadable, malformed) logs and
/// returns `default`. Use for soft caches where availability beats
/// strict fidelity.
pub fn read_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    match read_json_strict(path) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read JSON, using default");
            default
        }
    }
}

/// Serialize `data` as pretty JSON and atomically replace `path`.
///
/// Writes to a uniquely-named sibling temp file first, then renames over
/// the target, so readers never observe a partial file. Parent
/// directories are created as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::InvalidPath(format!("{}", path.display())))?;
    let tmp = path.with_file_name(format!(
        "{file_name}.{}.tmp",
        uuid::Uuid::new_v4().simple()
    ));

    let content = serde_json::to_string_pretty(data)
        .map_err(|e| StoreError::Persistence(format!("JSON serialization failed: {e}")))?;

    let result = std::fs::write(&tmp, content)
        .and_then(|_| std::fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        tracing::error!(path = %path.display(), error = %e, "Atomic JSON write failed");
        return Err(e.into());
    }
    Ok(())
}

/// Safely join a relative path onto `base`.
///
/// Rejects absolute paths, drive/scheme colons, and any `..` segment,
/// before touching the filesystem.
pub fn safe_join(base: &Path, rel: &str) -> Result<PathBuf, StoreError> {
    let rel_str = rel.replace('\\', "/");
    let rel_str = rel_str.trim();
    if rel_str.starts_with('/') {
        return Err(StoreError::InvalidPath(format!(
            "absolute paths are not allowed: {rel_str}"
        )));
    }
    if rel_str.contains(':') {
        return Err(StoreError::InvalidPath(format!(
            "drive paths are not allowed: {rel_str}"
        )));
    }
    let parts: Vec<&str> = rel_str.split('/').filter(|p| !p.is_empty()).collect();
    if parts.iter().any(|p| *p == "..") {
        return Err(StoreError::InvalidPath(format!(
            "path traversal detected: {rel_str}"
        )));
    }
    let mut out = base.to_path_buf();
    for part in parts {
        out.push(part);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
