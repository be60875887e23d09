//! On-disk layout of the model library.
//!
//! Maps each [`ModelKind`] to a directory under a single models root and
//! lists the weight files present in it. The download worker and the
//! fingerprint builder both go through this handle rather than touching
//! paths directly.

use std::path::{Path, PathBuf};

use modelbay_core::validate::ALLOWED_EXTENSIONS;
use modelbay_core::ModelKind;

use crate::error::StoreError;
use crate::fs::safe_join;

/// Handle to the models root directory.
#[derive(Debug, Clone)]
pub struct ModelLibrary {
    models_root: PathBuf,
}

impl ModelLibrary {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self {
            models_root: models_root.into(),
        }
    }

    /// Root directory holding one subdirectory per kind.
    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    /// Resolve the directory for a kind.
    ///
    /// `clip` files historically live under the text-encoders root when
    /// no dedicated clip directory exists, so that alias is applied
    /// here. The directory is not required to exist yet.
    pub fn resolve_dir(&self, kind: ModelKind) -> PathBuf {
        if kind == ModelKind::Clip {
            let clip_dir = self.models_root.join(ModelKind::Clip.dir_name());
            if !clip_dir.is_dir() {
                return self.models_root.join(ModelKind::TextEncoders.dir_name());
            }
        }
        self.models_root.join(kind.dir_name())
    }

    /// Absolute path of a file of `kind` addressed by its relative path.
    pub fn full_path(&self, kind: ModelKind, relpath: &str) -> Result<PathBuf, StoreError> {
        safe_join(&self.resolve_dir(kind), relpath)
    }

    /// List weight files of a kind as sorted, `/`-separated relative
    /// paths. A missing directory yields an empty list; unreadable
    /// subtrees are logged and skipped.
    pub fn list_files(&self, kind: ModelKind) -> Vec<String> {
        let dir = self.resolve_dir(kind);
        let mut out = Vec::new();
        collect_weight_files(&dir, &dir, &mut out);
        out.sort();
        out
    }
}

fn collect_weight_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if dir != root || dir.exists() {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to list model directory");
            }
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_weight_files(root, &path, out);
        } else if has_weight_extension(&path) {
            if let Ok(rel) = path.strip_prefix(root) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(rel);
            }
        }
    }
}

fn has_weight_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
