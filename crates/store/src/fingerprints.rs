//! Content-fingerprint cache for on-disk model files.
//!
//! A fingerprint is a fast identity signature, not an integrity
//! checksum: files under 2 MiB are fully SHA-256 hashed, larger files
//! hash only the first and last MiB, and the decimal file size is
//! always appended to the hash input. This scheme is load-bearing for
//! compatibility with existing caches and must not change shape.
//!
//! Builds are mutually exclusive via a dedicated lock; lookups read the
//! last-persisted cache file and are never blocked by a running build.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use modelbay_core::ModelKind;

use crate::error::StoreError;
use crate::fs::{read_json, write_json_atomic};
use crate::library::ModelLibrary;

/// Schema version of the fingerprint cache file.
pub const FINGERPRINT_SCHEMA: u32 = 1;

/// Files below this size are hashed in full.
const FULL_HASH_LIMIT: u64 = 2 * 1024 * 1024;

/// Window hashed at each end of a large file.
const PARTIAL_WINDOW: u64 = 1024 * 1024;

/// One cached fingerprint, keyed by `(kind, relpath)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub kind: ModelKind,
    pub relpath: String,
    pub size: u64,
    pub mtime: f64,
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    schema: u32,
    updated_at: String,
    items: Vec<FingerprintRecord>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            schema: FINGERPRINT_SCHEMA,
            updated_at: String::new(),
            items: Vec::new(),
        }
    }
}

/// Counters reported by one cache build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildStats {
    pub count: usize,
    pub hashed: usize,
    pub reused: usize,
    pub total: usize,
    pub updated_at: String,
}

/// Summary of the persisted cache without triggering a build.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub count: usize,
    pub updated_at: String,
}

/// The fingerprint cache: builder plus query surface.
#[derive(Debug)]
pub struct FingerprintIndex {
    path: PathBuf,
    library: ModelLibrary,
    build_lock: Mutex<()>,
}

impl FingerprintIndex {
    pub fn new(path: impl Into<PathBuf>, library: ModelLibrary) -> Self {
        Self {
            path: path.into(),
            library,
            build_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> CacheFile {
        let data: CacheFile = read_json(&self.path, CacheFile::default());
        if data.schema != FINGERPRINT_SCHEMA {
            return CacheFile::default();
        }
        data
    }

    /// Rebuild the cache for the given kinds, replacing the persisted
    /// file wholesale. Entries whose size and mtime are unchanged reuse
    /// the prior fingerprint unless `force` is set. At most one build
    /// runs at a time; concurrent callers block until the prior build
    /// finishes.
    pub fn build_blocking(
        &self,
        kinds: &[ModelKind],
        force: bool,
    ) -> Result<BuildStats, StoreError> {
        let _guard = self
            .build_lock
            .lock()
            .map_err(|_| StoreError::Persistence("fingerprint build lock poisoned".to_string()))?;

        let cache = self.load();
        let existing: HashMap<(ModelKind, &str), &FingerprintRecord> = cache
            .items
            .iter()
            .map(|item| ((item.kind, item.relpath.as_str()), item))
            .collect();

        let mut items = Vec::new();
        let mut hashed = 0usize;
        let mut reused = 0usize;
        let mut total = 0usize;

        for &kind in kinds {
            for relpath in self.library.list_files(kind) {
                total += 1;
                let full_path = match self.library.full_path(kind, &relpath) {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(kind = %kind, relpath = %relpath, error = %e, "Skipping unresolvable path");
                        continue;
                    }
                };
                let (size, mtime) = match stat_file(&full_path) {
                    Ok(stat) => stat,
                    Err(e) => {
                        tracing::warn!(path = %full_path.display(), error = %e, "Failed to stat model file");
                        continue;
                    }
                };

                let prev = existing.get(&(kind, relpath.as_str()));
                let fingerprint = match prev {
                    Some(prev)
                        if !force
                            && prev.size == size
                            && prev.mtime == mtime
                            && !prev.fingerprint.is_empty() =>
                    {
                        reused += 1;
                        prev.fingerprint.clone()
                    }
                    _ => match hash_file(&full_path) {
                        Ok(fp) => {
                            hashed += 1;
                            fp
                        }
                        Err(e) => {
                            tracing::warn!(path = %full_path.display(), error = %e, "Failed to hash model file");
                            continue;
                        }
                    },
                };

                items.push(FingerprintRecord {
                    kind,
                    relpath,
                    size,
                    mtime,
                    fingerprint,
                });
            }
        }

        let updated_at = chrono::Utc::now().to_rfc3339();
        let count = items.len();
        let payload = CacheFile {
            schema: FINGERPRINT_SCHEMA,
            updated_at: updated_at.clone(),
            items,
        };
        write_json_atomic(&self.path, &payload)?;

        Ok(BuildStats {
            count,
            hashed,
            reused,
            total,
            updated_at,
        })
    }

    /// Async wrapper: run the build on the blocking thread pool so the
    /// calling task is not pinned for the duration of the disk scan.
    pub async fn build(
        self: &Arc<Self>,
        kinds: Vec<ModelKind>,
        force: bool,
    ) -> Result<BuildStats, StoreError> {
        let index = Arc::clone(self);
        tokio::task::spawn_blocking(move || index.build_blocking(&kinds, force))
            .await
            .map_err(|e| StoreError::Persistence(format!("fingerprint build task failed: {e}")))?
    }

    /// Find the relative path of a cached file with this fingerprint.
    pub fn lookup(&self, kind: ModelKind, fingerprint: &str) -> Option<String> {
        self.load()
            .items
            .into_iter()
            .find(|item| item.kind == kind && item.fingerprint == fingerprint)
            .map(|item| item.relpath)
    }

    /// Cache size and freshness.
    pub fn status(&self) -> CacheStatus {
        let cache = self.load();
        CacheStatus {
            count: cache.items.len(),
            updated_at: cache.updated_at,
        }
    }
}

fn stat_file(path: &Path) -> std::io::Result<(u64, f64)> {
    let meta = std::fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok((meta.len(), mtime))
}

/// Compute the content fingerprint of a file.
///
/// Small files (< 2 MiB) are hashed in full. Larger files hash the
/// first MiB and the last MiB only. The decimal size string is appended
/// to the hash input in both cases.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let size = std::fs::metadata(path)?.len();
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();

    if size < FULL_HASH_LIMIT {
        let mut content = Vec::with_capacity(size as usize);
        file.read_to_end(&mut content)?;
        hasher.update(&content);
    } else {
        let mut window = vec![0u8; PARTIAL_WINDOW as usize];
        let head = read_up_to(&mut file, &mut window)?;
        hasher.update(&window[..head]);
        file.seek(SeekFrom::Start(size.saturating_sub(PARTIAL_WINDOW)))?;
        let tail = read_up_to(&mut file, &mut window)?;
        hasher.update(&window[..tail]);
    }

    hasher.update(size.to_string().as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn read_up_to(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
