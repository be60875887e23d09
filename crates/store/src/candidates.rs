//! On-disk candidate scanning for missing-model references.
//!
//! Matches missing references against files actually present in the
//! library by fuzzy name similarity, flagging exact matches that sit in
//! the wrong kind directory, and supports relocating such files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use modelbay_core::matcher::{self, MatchProfile};
use modelbay_core::validate::basename;
use modelbay_core::{CoreError, ModelKind};

use crate::error::StoreError;
use crate::library::ModelLibrary;

/// Maximum candidates returned per missing entry.
pub const MAX_CANDIDATES: usize = 10;

/// Maximum missing entries accepted per scan.
pub const MAX_MISSING: usize = 200;

/// One missing reference to scan for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub missing_value: String,
    #[serde(default)]
    pub type_hint: Option<String>,
    /// Kind the reference is expected in; inferred from the type hint
    /// when absent.
    #[serde(default)]
    pub expected_kind: Option<ModelKind>,
}

/// A scored on-disk candidate for a missing reference.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub kind: ModelKind,
    pub relpath: String,
    pub basename: String,
    pub score: u8,
    pub reason: String,
    pub in_wrong_folder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_kind: Option<ModelKind>,
}

/// Scan outcome for one missing reference.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScan {
    pub missing_value: String,
    pub type_hint: String,
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_match_wrong_folder: Option<Candidate>,
}

/// A completed relocation.
#[derive(Debug, Clone, Serialize)]
pub struct MovedFile {
    pub source_path: String,
    pub target_path: String,
    pub target_relpath: String,
}

/// Scan the library for candidates matching each missing reference.
///
/// The searched kinds narrow by type hint where the hint is
/// unambiguous; everything else scans all kinds. File listings are
/// fetched once per kind per scan.
pub fn scan_candidates(
    library: &ModelLibrary,
    missing: &[ScanRequest],
) -> Result<Vec<CandidateScan>, CoreError> {
    if missing.len() > MAX_MISSING {
        return Err(CoreError::Validation(format!(
            "missing exceeds limit ({MAX_MISSING})"
        )));
    }

    let profile = MatchProfile::disk_candidates();
    let mut listings: HashMap<ModelKind, Vec<String>> = HashMap::new();

    let mut results = Vec::with_capacity(missing.len());
    for entry in missing {
        let missing_value = entry.missing_value.trim().to_string();
        let type_hint = entry
            .type_hint
            .as_deref()
            .unwrap_or("unknown")
            .trim()
            .to_lowercase();
        let expected_kind = entry
            .expected_kind
            .or_else(|| ModelKind::from_type_hint(&type_hint));

        if missing_value.is_empty() {
            results.push(CandidateScan {
                missing_value,
                type_hint,
                candidates: Vec::new(),
                exact_match_wrong_folder: None,
            });
            continue;
        }

        let base = basename(&missing_value);
        let mut candidates = Vec::new();
        let mut exact_match_wrong_folder: Option<Candidate> = None;

        for &kind in ModelKind::scan_kinds_for_hint(&type_hint) {
            let files = listings
                .entry(kind)
                .or_insert_with(|| library.list_files(kind));
            for relpath in files.iter() {
                let cand_base = basename(relpath);
                let (score, mut reason) = matcher::score(&base, &cand_base, "", &profile);

                let in_wrong_folder = score == 100
                    && expected_kind.is_some_and(|expected| expected != kind);
                if in_wrong_folder {
                    reason = "wrong_folder".to_string();
                }

                let candidate = Candidate {
                    kind,
                    relpath: relpath.clone(),
                    basename: cand_base,
                    score,
                    reason,
                    in_wrong_folder,
                    expected_kind: in_wrong_folder.then_some(expected_kind).flatten(),
                };
                if in_wrong_folder && exact_match_wrong_folder.is_none() {
                    exact_match_wrong_folder = Some(candidate.clone());
                }
                candidates.push(candidate);
            }
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(MAX_CANDIDATES);
        results.push(CandidateScan {
            missing_value,
            type_hint,
            candidates,
            exact_match_wrong_folder,
        });
    }

    Ok(results)
}

/// Move a file from one kind directory to another, keeping only its
/// basename. Refuses to overwrite an existing target.
pub fn move_to_kind(
    library: &ModelLibrary,
    source_kind: ModelKind,
    source_relpath: &str,
    target_kind: ModelKind,
) -> Result<MovedFile, StoreError> {
    let source_path = library.full_path(source_kind, source_relpath)?;
    if !source_path.is_file() {
        return Err(StoreError::NotFound(format!(
            "source file not found: {}",
            source_path.display()
        )));
    }

    let target_dir = library.resolve_dir(target_kind);
    std::fs::create_dir_all(&target_dir)?;

    let target_relpath = basename(source_relpath);
    let target_path = target_dir.join(&target_relpath);
    if target_path.exists() {
        return Err(StoreError::Conflict(format!(
            "target file already exists: {}",
            target_path.display()
        )));
    }

    std::fs::rename(&source_path, &target_path)?;
    tracing::info!(
        source = %source_path.display(),
        target = %target_path.display(),
        "Moved model file between kind directories",
    );

    Ok(MovedFile {
        source_path: source_path.display().to_string(),
        target_path: target_path.display().to_string(),
        target_relpath,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
