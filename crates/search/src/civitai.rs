//! CivitAI model search.

use std::collections::HashMap;

use serde::Deserialize;

use modelbay_core::matcher::{self, MatchProfile};
use modelbay_core::ModelKind;

use crate::http::SearchClient;
use crate::types::{dedupe_by_url, Platform, SearchResult, MIN_PLATFORM_SCORE};

#[derive(Debug, Default, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<Model>,
}

#[derive(Debug, Deserialize)]
struct Model {
    id: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    model_type: String,
    #[serde(default, rename = "modelVersions")]
    versions: Vec<Version>,
}

#[derive(Debug, Deserialize)]
struct Version {
    #[serde(default)]
    name: String,
    #[serde(default)]
    files: Vec<File>,
}

#[derive(Debug, Deserialize)]
struct File {
    #[serde(default)]
    name: String,
    #[serde(default)]
    primary: bool,
    #[serde(default, rename = "downloadUrl")]
    download_url: String,
    #[serde(default, rename = "sizeKB")]
    size_kb: f64,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

/// Map CivitAI's model-type taxonomy onto the local category set.
/// Unknown types default to checkpoints.
pub(crate) fn kind_for_type(model_type: &str) -> ModelKind {
    match model_type {
        "checkpoint" => ModelKind::Checkpoints,
        "lora" | "hypernetwork" | "aestheticgradient" => ModelKind::Loras,
        "textualinversion" => ModelKind::Embeddings,
        "controlnet" => ModelKind::Controlnet,
        "vae" => ModelKind::Vae,
        "upscaler" => ModelKind::UpscaleModels,
        _ => ModelKind::Checkpoints,
    }
}

impl SearchClient {
    /// Search CivitAI's public model API, scoring each model's primary
    /// file against the query.
    pub async fn search_civitai(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let url = format!("{}/api/v1/models", self.endpoints.civitai);
        let limit_param = limit.to_string();
        let request = self.get(&url).query(&[
            ("query", query),
            ("limit", limit_param.as_str()),
            ("nsfw", "false"),
        ]);
        let Some(page) = self.fetch_json::<SearchPage>(request, "civitai search").await else {
            return Vec::new();
        };

        let profile = MatchProfile::search_ranking();
        let mut results = Vec::new();
        for model in page.items.iter().take(limit) {
            let Some(version) = model.versions.first() else {
                continue;
            };
            let Some(file) = version
                .files
                .iter()
                .find(|f| f.primary)
                .or_else(|| version.files.first())
            else {
                continue;
            };
            if file.download_url.is_empty() {
                continue;
            }

            let name = format!("{} - {}", model.name, version.name);
            let (score, level) = matcher::score(query, &name, &file.name, &profile);
            results.push(SearchResult {
                platform: Platform::Civitai,
                name,
                filename: file.name.clone(),
                url: file.download_url.clone(),
                page_url: model
                    .id
                    .map(|id| format!("{}/models/{id}", self.endpoints.civitai))
                    .unwrap_or_default(),
                kind: kind_for_type(&model.model_type.to_lowercase()),
                version: version.name.clone(),
                size_mb: (file.size_kb / 1024.0) as u64,
                sha256: file
                    .hashes
                    .get("SHA256")
                    .filter(|h| !h.is_empty())
                    .map(|h| h.to_lowercase()),
                match_score: score as f64,
                match_level: level,
            });
        }

        dedupe_by_url(results, limit, MIN_PLATFORM_SCORE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- kind_for_type -------------------------------------------------------

    #[test]
    fn known_types_map_to_kinds() {
        assert_eq!(kind_for_type("checkpoint"), ModelKind::Checkpoints);
        assert_eq!(kind_for_type("lora"), ModelKind::Loras);
        assert_eq!(kind_for_type("hypernetwork"), ModelKind::Loras);
        assert_eq!(kind_for_type("aestheticgradient"), ModelKind::Loras);
        assert_eq!(kind_for_type("textualinversion"), ModelKind::Embeddings);
        assert_eq!(kind_for_type("controlnet"), ModelKind::Controlnet);
        assert_eq!(kind_for_type("vae"), ModelKind::Vae);
        assert_eq!(kind_for_type("upscaler"), ModelKind::UpscaleModels);
    }

    #[test]
    fn unknown_type_defaults_to_checkpoints() {
        assert_eq!(kind_for_type("motionmodule"), ModelKind::Checkpoints);
        assert_eq!(kind_for_type(""), ModelKind::Checkpoints);
    }

    // -- response decoding ---------------------------------------------------

    #[test]
    fn page_decodes_with_missing_fields() {
        let page: SearchPage = serde_json::from_str(
            r#"{"items": [{"id": 7, "name": "Thing", "type": "LORA",
                 "modelVersions": [{"name": "v2", "files": [
                   {"name": "thing_v2.safetensors", "primary": true,
                    "downloadUrl": "https://civitai.com/api/download/models/7",
                    "sizeKB": 2048.0,
                    "hashes": {"SHA256": "ABC123"}}]}]}]}"#,
        )
        .unwrap();
        let model = &page.items[0];
        assert_eq!(model.versions[0].files[0].size_kb, 2048.0);
        assert!(model.versions[0].files[0].primary);

        let empty: SearchPage = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }
}
