//! Persisted download recipes, keyed by file basename.
//!
//! A recipe records how to re-download a specific named file (source
//! URL, category, optional checksum). The store is a flat JSON mapping
//! merged on save and persisted sorted by key so diffs stay stable.
//! Credentials are never part of a recipe.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use modelbay_core::validate::{basename, DownloadItem};
use modelbay_core::{CoreError, ModelKind};

use crate::error::StoreError;
use crate::fs::{read_json, write_json_atomic};

/// Schema version of the recipe store file.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum recipes accepted per save.
pub const MAX_SAVE_ITEMS: usize = 50;

/// A reusable description of how to download one named file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub key: String,
    pub kind: ModelKind,
    pub url: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl From<DownloadItem> for Recipe {
    /// A validated download item minus its credential.
    fn from(item: DownloadItem) -> Self {
        Self {
            key: item.key,
            kind: item.kind,
            url: item.url,
            filename: item.filename,
            sha256: item.sha256,
        }
    }
}

/// One missing-model reference to resolve.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissingRef {
    #[serde(default)]
    pub missing_value: String,
    #[serde(default)]
    pub type_hint: Option<String>,
}

/// Resolution outcome for one missing reference.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecipe {
    pub missing_value: String,
    pub key: String,
    pub kind: Option<ModelKind>,
    pub recipe: Option<Recipe>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SourcesFile {
    schema: u32,
    updated_at: String,
    items: Vec<Recipe>,
}

impl Default for SourcesFile {
    fn default() -> Self {
        Self {
            schema: SCHEMA_VERSION,
            updated_at: String::new(),
            items: Vec::new(),
        }
    }
}

/// JSON-file-backed recipe store.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    path: PathBuf,
}

impl RecipeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the store, resetting to empty on schema mismatch or
    /// corruption. Soft-cache policy: never fail a read.
    fn load(&self) -> SourcesFile {
        let data: SourcesFile = read_json(&self.path, SourcesFile::default());
        if data.schema != SCHEMA_VERSION {
            return SourcesFile::default();
        }
        data
    }

    /// Resolve missing references against the persisted mapping.
    ///
    /// Absence is not an error: entries without a recipe come back with
    /// `recipe: None` and no kind (hint-based inference is the
    /// resolution layer's job).
    pub fn resolve(&self, missing: &[MissingRef]) -> Vec<ResolvedRecipe> {
        let data = self.load();
        let by_key: BTreeMap<&str, &Recipe> =
            data.items.iter().map(|r| (r.key.as_str(), r)).collect();

        missing
            .iter()
            .map(|entry| {
                let key = basename(&entry.missing_value);
                let recipe = by_key.get(key.as_str()).map(|r| (*r).clone());
                ResolvedRecipe {
                    missing_value: entry.missing_value.clone(),
                    key,
                    kind: recipe.as_ref().map(|r| r.kind),
                    recipe,
                }
            })
            .collect()
    }

    /// Merge `items` into the store by key and persist, sorted by key.
    /// Entries with an empty key are ignored.
    pub fn save(&self, items: &[Recipe]) -> Result<(), StoreError> {
        if items.len() > MAX_SAVE_ITEMS {
            return Err(CoreError::Validation("too many items".to_string()).into());
        }
        let data = self.load();
        let mut merged: BTreeMap<String, Recipe> = data
            .items
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect();
        for item in items {
            if item.key.is_empty() {
                continue;
            }
            merged.insert(item.key.clone(), item.clone());
        }

        let payload = SourcesFile {
            schema: SCHEMA_VERSION,
            updated_at: chrono::Utc::now().to_rfc3339(),
            items: merged.into_values().collect(),
        };
        write_json_atomic(&self.path, &payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RecipeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecipeStore::new(dir.path().join("model_sources.json"));
        (dir, store)
    }

    fn recipe(key: &str, kind: ModelKind) -> Recipe {
        Recipe {
            key: key.to_string(),
            kind,
            url: format!("https://host/{key}"),
            filename: key.to_string(),
            sha256: None,
        }
    }

    fn missing(value: &str) -> MissingRef {
        MissingRef {
            missing_value: value.to_string(),
            type_hint: None,
        }
    }

    // -- resolve -------------------------------------------------------------

    #[test]
    fn unknown_key_resolves_to_none() {
        let (_dir, store) = store();
        let resolved = store.resolve(&[missing("foo.safetensors")]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].key, "foo.safetensors");
        assert!(resolved[0].recipe.is_none());
        assert!(resolved[0].kind.is_none());
    }

    #[test]
    fn key_is_basename_of_missing_value() {
        let (_dir, store) = store();
        let resolved = store.resolve(&[missing("sub\\dir\\foo.safetensors")]);
        assert_eq!(resolved[0].key, "foo.safetensors");
    }

    #[test]
    fn saved_recipe_resolves_verbatim() {
        let (_dir, store) = store();
        let r = recipe("a.safetensors", ModelKind::Loras);
        store.save(std::slice::from_ref(&r)).unwrap();

        let resolved = store.resolve(&[missing("a.safetensors")]);
        assert_eq!(resolved[0].recipe.as_ref(), Some(&r));
        assert_eq!(resolved[0].kind, Some(ModelKind::Loras));
    }

    // -- save ----------------------------------------------------------------

    #[test]
    fn save_merges_by_key_and_sorts() {
        let (_dir, store) = store();
        store
            .save(&[recipe("b.ckpt", ModelKind::Vae), recipe("a.pt", ModelKind::Unet)])
            .unwrap();
        // Overwrite one key, add another.
        store
            .save(&[recipe("b.ckpt", ModelKind::Checkpoints), recipe("c.bin", ModelKind::Clip)])
            .unwrap();

        let data = store.load();
        let keys: Vec<&str> = data.items.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a.pt", "b.ckpt", "c.bin"]);
        assert_eq!(data.items[1].kind, ModelKind::Checkpoints);
    }

    #[test]
    fn oversized_save_is_rejected() {
        let (_dir, store) = store();
        let items: Vec<Recipe> = (0..MAX_SAVE_ITEMS + 1)
            .map(|i| recipe(&format!("r{i}.pt"), ModelKind::Loras))
            .collect();
        assert!(store.save(&items).is_err());
        assert!(!store.path.exists());
    }

    #[test]
    fn schema_mismatch_resets_to_empty() {
        let (_dir, store) = store();
        store.save(&[recipe("a.pt", ModelKind::Unet)]).unwrap();

        // Corrupt the schema marker on disk.
        let raw = std::fs::read_to_string(&store.path).unwrap();
        std::fs::write(&store.path, raw.replace("\"schema\": 1", "\"schema\": 99")).unwrap();

        let resolved = store.resolve(&[missing("a.pt")]);
        assert!(resolved[0].recipe.is_none());
    }

    #[test]
    fn recipe_from_item_drops_token() {
        let item = DownloadItem {
            key: "k.safetensors".into(),
            kind: ModelKind::Loras,
            url: "https://host/k.safetensors".into(),
            filename: "k.safetensors".into(),
            sha256: Some("a".repeat(64)),
            token: Some("secret".into()),
        };
        let r = Recipe::from(item);
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("token"));
    }
}
