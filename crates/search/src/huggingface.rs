//! Hugging Face model and repo-file search.
//!
//! Three layers, tried in order: a shortlist of known official Stable
//! Diffusion releases that short-circuits without any network call, the
//! public model-search API, and a whitelisted multi-file repo scan used
//! when neither produces a confident match. Tree listings for the repo
//! scan are cached with a TTL so repeated queries do not hammer the
//! API.

use std::time::{Duration, Instant};

use serde::Deserialize;

use modelbay_core::matcher::{self, MatchProfile};
use modelbay_core::urls::canonicalize_hf_url;
use modelbay_core::validate::basename;
use modelbay_core::ModelKind;

use crate::http::SearchClient;
use crate::types::{
    dedupe_by_url, is_weight_file, sort_by_score, Platform, SearchResult, GOOD_SCORE,
    MIN_PLATFORM_SCORE,
};

/// Repos known to host useful weight files directly, as opposed to
/// model cards pointing at other repos. Scanned as a fallback only.
pub const FILE_SEARCH_REPOS: &[&str] = &[
    "Kijai/WanVideo_comfy",
    "stabilityai/sd-vae-ft-mse-original",
    "stabilityai/sdxl-vae",
];

/// How long a fetched tree listing stays valid.
pub const TREE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Minimum score for the targeted repo-file scan; lower than the
/// platform threshold since the scan is already narrowed to known
/// weight repos.
const FILE_SEARCH_MIN_SCORE: f64 = 75.0;

/// A known official Stable Diffusion release.
struct OfficialModel {
    key: &'static str,
    model_id: &'static str,
    filename: &'static str,
    alt_filename: Option<&'static str>,
    name: &'static str,
}

const OFFICIAL_MODELS: &[OfficialModel] = &[
    OfficialModel {
        key: "v1-5-pruned-emaonly",
        model_id: "runwayml/stable-diffusion-v1-5",
        filename: "v1-5-pruned-emaonly.safetensors",
        alt_filename: Some("v1-5-pruned-emaonly.ckpt"),
        name: "Stable Diffusion v1.5",
    },
    OfficialModel {
        key: "v1-5-pruned",
        model_id: "runwayml/stable-diffusion-v1-5",
        filename: "v1-5-pruned.safetensors",
        alt_filename: None,
        name: "Stable Diffusion v1.5",
    },
    OfficialModel {
        key: "v2-1_768-ema-pruned",
        model_id: "stabilityai/stable-diffusion-2-1",
        filename: "v2-1_768-ema-pruned.safetensors",
        alt_filename: None,
        name: "Stable Diffusion v2.1",
    },
    OfficialModel {
        key: "v2-1_512-ema-pruned",
        model_id: "stabilityai/stable-diffusion-2-1-base",
        filename: "v2-1_512-ema-pruned.safetensors",
        alt_filename: None,
        name: "Stable Diffusion v2.1 Base",
    },
    OfficialModel {
        key: "sd_xl_base_1.0",
        model_id: "stabilityai/stable-diffusion-xl-base-1.0",
        filename: "sd_xl_base_1.0.safetensors",
        alt_filename: None,
        name: "Stable Diffusion XL Base 1.0",
    },
    OfficialModel {
        key: "sd_xl_refiner_1.0",
        model_id: "stabilityai/stable-diffusion-xl-refiner-1.0",
        filename: "sd_xl_refiner_1.0.safetensors",
        alt_filename: None,
        name: "Stable Diffusion XL Refiner 1.0",
    },
];

/// One entry of a repo tree listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HfTreeEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub lfs: Option<HfLfsInfo>,
    #[serde(default, rename = "lastCommit")]
    pub last_commit: Option<HfCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HfLfsInfo {
    #[serde(default)]
    pub oid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HfCommit {
    #[serde(default)]
    pub oid: String,
}

#[derive(Debug, Deserialize)]
struct HfModel {
    #[serde(default)]
    id: String,
    #[serde(default)]
    siblings: Vec<HfSibling>,
}

#[derive(Debug, Deserialize)]
struct HfSibling {
    #[serde(default)]
    rfilename: String,
}

/// Pick the sibling to download: the first safetensors file, otherwise
/// the last other weight file seen.
fn best_weight_file(siblings: &[HfSibling]) -> Option<&str> {
    let mut best: Option<&str> = None;
    for sibling in siblings {
        let lower = sibling.rfilename.to_lowercase();
        if lower.ends_with(".safetensors") {
            return Some(&sibling.rfilename);
        }
        if lower.ends_with(".ckpt") || lower.ends_with(".pt") || lower.ends_with(".bin") {
            best = Some(&sibling.rfilename);
        }
    }
    best
}

/// Guess a kind for a file found in a scanned repo from the repo path
/// segments and the dot-separated filename parts.
fn kind_for_repo_file(repo_id: &str, filename: &str) -> ModelKind {
    let repo = repo_id.to_lowercase();
    let file = filename.to_lowercase();
    let tags: Vec<&str> = repo.split('/').chain(file.split('.')).collect();
    if tags.contains(&"lora") {
        ModelKind::Loras
    } else if tags.contains(&"vae") {
        ModelKind::Vae
    } else if tags.contains(&"controlnet") {
        ModelKind::Controlnet
    } else if tags.contains(&"clip") {
        ModelKind::Clip
    } else {
        ModelKind::Checkpoints
    }
}

impl SearchClient {
    /// Search Hugging Face for models matching the query.
    pub async fn search_huggingface(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let mut results = self.official_results(query);
        // Confident official matches need no network at all.
        if results.iter().any(|r| r.match_score >= 95.0) {
            results.truncate(limit);
            return results;
        }

        let url = format!("{}/api/models", self.endpoints.huggingface);
        let limit_param = (limit * 2).to_string();
        let request = self.hf_auth(
            self.get(&url)
                .query(&[("search", query), ("limit", limit_param.as_str())]),
        );
        let models: Vec<HfModel> = self
            .fetch_json(request, "huggingface search")
            .await
            .unwrap_or_default();

        let profile = MatchProfile::search_ranking();
        for model in &models {
            if model.id.is_empty() {
                continue;
            }
            // The model-search API returns no specific file, so the
            // score comes from the model id alone.
            let (score, level) = matcher::score(query, &model.id, "", &profile);
            let Some(file) = best_weight_file(&model.siblings) else {
                continue;
            };
            results.push(SearchResult {
                platform: Platform::Huggingface,
                name: model.id.clone(),
                filename: file.to_string(),
                url: canonicalize_hf_url(&format!(
                    "{}/{}/resolve/main/{file}",
                    self.endpoints.huggingface, model.id
                )),
                page_url: format!("{}/{}", self.endpoints.huggingface, model.id),
                kind: ModelKind::Checkpoints,
                version: "main".to_string(),
                size_mb: 0,
                sha256: None,
                match_score: score as f64,
                match_level: format!("{level} (model)"),
            });
        }

        if !results.iter().any(|r| r.match_score >= GOOD_SCORE) {
            tracing::info!(query, "No confident model-search result, scanning file repos");
            results.extend(self.search_repo_files(query, limit).await);
        }

        dedupe_by_url(results, limit, MIN_PLATFORM_SCORE)
    }

    /// Score the query against the official-release shortlist. Pure
    /// string work, no network.
    fn official_results(&self, query: &str) -> Vec<SearchResult> {
        let profile = MatchProfile::search_ranking();
        let query_normalized = query.trim().to_lowercase().replace(['_', ' '], "-");
        let mut results = Vec::new();

        for official in OFFICIAL_MODELS {
            let key_normalized = official.key.to_lowercase().replace('_', "-");
            if !query_normalized.contains(&key_normalized)
                && !key_normalized.contains(&query_normalized)
            {
                continue;
            }

            for fname in [Some(official.filename), official.alt_filename]
                .into_iter()
                .flatten()
            {
                let (raw_score, raw_level) = matcher::score(query, official.name, fname, &profile);
                let mut score = raw_score as f64;
                let mut level = raw_level;

                let fname_base = fname
                    .to_lowercase()
                    .replace(".safetensors", "")
                    .replace(".ckpt", "");
                if query_normalized == fname_base {
                    score = 100.0;
                    level = "exact_official".to_string();
                } else if query_normalized.replace("-fp16", "").replace("-fp32", "") == fname_base {
                    score = 98.0;
                    level = "official_precision_variant".to_string();
                }

                results.push(SearchResult {
                    platform: Platform::Huggingface,
                    name: format!("{} (official)", official.name),
                    filename: fname.to_string(),
                    url: canonicalize_hf_url(&format!(
                        "{}/{}/resolve/main/{fname}",
                        self.endpoints.huggingface, official.model_id
                    )),
                    page_url: format!("{}/{}", self.endpoints.huggingface, official.model_id),
                    kind: ModelKind::Checkpoints,
                    version: "official".to_string(),
                    size_mb: 0,
                    sha256: None,
                    match_score: score,
                    match_level: level,
                });
            }
        }
        results
    }

    /// Fallback search scanning whitelisted multi-file repos.
    pub(crate) async fn search_repo_files(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        if query.chars().count() < 4 {
            return Vec::new();
        }

        let profile = MatchProfile::search_ranking();
        let mut results = Vec::new();
        for repo_id in FILE_SEARCH_REPOS {
            if results.len() >= limit {
                break;
            }
            let files = self.repo_tree(repo_id).await;
            for entry in &files {
                // Bound the scan on huge repos once enough candidates
                // have accumulated.
                if results.len() > limit * 2 {
                    break;
                }
                if !is_weight_file(&entry.path) {
                    continue;
                }
                let filename = basename(&entry.path);
                let (score, level) = matcher::score(query, &filename, &filename, &profile);
                if (score as f64) < FILE_SEARCH_MIN_SCORE {
                    continue;
                }
                results.push(SearchResult {
                    platform: Platform::Huggingface,
                    name: format!("{repo_id} (file)"),
                    filename: filename.clone(),
                    url: canonicalize_hf_url(&format!(
                        "{}/{repo_id}/resolve/main/{}",
                        self.endpoints.huggingface, entry.path
                    )),
                    page_url: format!("{}/{repo_id}/tree/main", self.endpoints.huggingface),
                    kind: kind_for_repo_file(repo_id, &filename),
                    version: entry
                        .last_commit
                        .as_ref()
                        .map(|c| c.oid.chars().take(7).collect())
                        .unwrap_or_else(|| "main".to_string()),
                    size_mb: entry.size / (1024 * 1024),
                    sha256: entry
                        .lfs
                        .as_ref()
                        .map(|l| l.oid.clone())
                        .filter(|oid| !oid.is_empty()),
                    match_score: score as f64,
                    match_level: format!("{level} (in {repo_id})"),
                });
            }
        }

        sort_by_score(&mut results);
        results.truncate(limit);
        results
    }

    /// Tree listing for a whitelisted repo, cached with a TTL. Fetch
    /// failures cache as empty so an unreachable repo is not re-fetched
    /// on every query.
    async fn repo_tree(&self, repo_id: &str) -> Vec<HfTreeEntry> {
        {
            let cache = self
                .hf_tree_cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some((fetched_at, files)) = cache.get(repo_id) {
                if fetched_at.elapsed() < TREE_CACHE_TTL {
                    return files.clone();
                }
            }
        }

        let files = self.fetch_tree(repo_id, true).await;
        tracing::info!(repo_id, files = files.len(), "Cached Hugging Face tree listing");
        let mut cache = self
            .hf_tree_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(repo_id.to_string(), (Instant::now(), files.clone()));
        files
    }

    /// Fetch a repo's `main` tree listing, degrading to empty.
    pub(crate) async fn fetch_tree(&self, repo_id: &str, recursive: bool) -> Vec<HfTreeEntry> {
        let mut url = format!(
            "{}/api/models/{repo_id}/tree/main",
            self.endpoints.huggingface
        );
        if recursive {
            url.push_str("?recursive=True");
        }
        let request = self.hf_auth(self.get(&url));
        self.fetch_json(request, "huggingface tree")
            .await
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::SearchConfig;

    fn client() -> SearchClient {
        SearchClient::new(SearchConfig::default()).unwrap()
    }

    // -- official shortlist --------------------------------------------------

    #[tokio::test]
    async fn official_exact_name_short_circuits_without_network() {
        let results = client().search_huggingface("v1-5-pruned-emaonly", 5).await;
        assert!(!results.is_empty());
        let top = &results[0];
        assert_eq!(top.match_score, 100.0);
        assert_eq!(top.match_level, "exact_official");
        assert_eq!(top.filename, "v1-5-pruned-emaonly.safetensors");
        assert!(top
            .url
            .ends_with("runwayml/stable-diffusion-v1-5/resolve/main/v1-5-pruned-emaonly.safetensors"));
    }

    #[tokio::test]
    async fn official_fp16_variant_scores_98() {
        let results = client()
            .search_huggingface("v1-5-pruned-emaonly-fp16", 5)
            .await;
        let top = &results[0];
        assert_eq!(top.match_score, 98.0);
        assert_eq!(top.match_level, "official_precision_variant");
    }

    #[tokio::test]
    async fn official_underscore_spelling_matches() {
        let results = client().search_huggingface("sd_xl_base_1.0", 5).await;
        assert_eq!(results[0].match_score, 100.0);
        assert_eq!(results[0].filename, "sd_xl_base_1.0.safetensors");
    }

    // -- best_weight_file ----------------------------------------------------

    #[test]
    fn safetensors_preferred_over_other_weights() {
        let siblings = vec![
            HfSibling { rfilename: "model.ckpt".into() },
            HfSibling { rfilename: "model.safetensors".into() },
            HfSibling { rfilename: "other.bin".into() },
        ];
        assert_eq!(best_weight_file(&siblings), Some("model.safetensors"));
    }

    #[test]
    fn last_non_safetensors_weight_wins_otherwise() {
        let siblings = vec![
            HfSibling { rfilename: "model.ckpt".into() },
            HfSibling { rfilename: "config.json".into() },
            HfSibling { rfilename: "weights.bin".into() },
        ];
        assert_eq!(best_weight_file(&siblings), Some("weights.bin"));
        assert_eq!(best_weight_file(&[]), None);
    }

    // -- kind_for_repo_file --------------------------------------------------

    #[test]
    fn repo_file_kind_guessed_from_tags() {
        assert_eq!(
            kind_for_repo_file("org/some-repo", "thing.lora.safetensors"),
            ModelKind::Loras
        );
        assert_eq!(kind_for_repo_file("org/vae", "x.safetensors"), ModelKind::Vae);
        assert_eq!(
            kind_for_repo_file("org/repo", "clip.vision.pt"),
            ModelKind::Clip
        );
        assert_eq!(
            kind_for_repo_file("org/repo", "model.safetensors"),
            ModelKind::Checkpoints
        );
    }

    // -- tree entry decoding -------------------------------------------------

    #[test]
    fn tree_entry_decodes_lfs_and_commit() {
        let entry: HfTreeEntry = serde_json::from_str(
            r#"{"path": "sub/model.safetensors", "size": 2097152,
                 "lfs": {"oid": "deadbeef"},
                 "lastCommit": {"oid": "0123456789abcdef"}}"#,
        )
        .unwrap();
        assert_eq!(entry.size, 2097152);
        assert_eq!(entry.lfs.unwrap().oid, "deadbeef");

        let bare: HfTreeEntry = serde_json::from_str(r#"{"path": "README.md"}"#).unwrap();
        assert!(bare.lfs.is_none());
        assert!(bare.last_commit.is_none());
    }
}
