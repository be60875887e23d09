//! GitHub release-asset search.
//!
//! Repositories matching the query are looked up through the search
//! API, then each repo's latest release is scanned for weight-file
//! assets.

use serde::Deserialize;

use modelbay_core::matcher::{self, MatchProfile};
use modelbay_core::ModelKind;

use crate::http::SearchClient;
use crate::types::{dedupe_by_url, is_weight_file, Platform, SearchResult, MIN_PLATFORM_SCORE};

#[derive(Debug, Default, Deserialize)]
struct RepoSearch {
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Asset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Guess a kind from a release-asset filename. Assets carry no type
/// taxonomy, so the name is all there is.
pub(crate) fn kind_from_asset_name(name: &str) -> ModelKind {
    let lower = name.to_lowercase();
    if lower.contains("lora") {
        ModelKind::Loras
    } else if lower.contains("vae") {
        ModelKind::Vae
    } else if lower.contains("controlnet") {
        ModelKind::Controlnet
    } else {
        ModelKind::Checkpoints
    }
}

impl SearchClient {
    /// Search GitHub releases for model weight assets matching the
    /// query.
    pub async fn search_github(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let url = format!("{}/search/repositories", self.endpoints.github_api);
        let q = format!("{query} extension:safetensors OR extension:ckpt");
        let per_page = limit.to_string();
        let request = self.github_headers(
            self.get(&url)
                .query(&[("q", q.as_str()), ("per_page", per_page.as_str())]),
        );
        let Some(page) = self.fetch_json::<RepoSearch>(request, "github repo search").await
        else {
            return Vec::new();
        };

        let profile = MatchProfile::search_ranking();
        let mut results = Vec::new();
        'repos: for repo in page.items.iter().take(limit) {
            if repo.full_name.is_empty() {
                continue;
            }
            let Some(release) = self.latest_release(&repo.full_name).await else {
                continue;
            };
            for asset in &release.assets {
                if !is_weight_file(&asset.name) || asset.browser_download_url.is_empty() {
                    continue;
                }
                let name = format!("{} - {}", repo.full_name, asset.name);
                let (score, level) = matcher::score(query, &name, &asset.name, &profile);
                results.push(SearchResult {
                    platform: Platform::Github,
                    name,
                    filename: asset.name.clone(),
                    url: asset.browser_download_url.clone(),
                    page_url: repo.html_url.clone(),
                    kind: kind_from_asset_name(&asset.name),
                    version: if release.tag_name.is_empty() {
                        "latest".to_string()
                    } else {
                        release.tag_name.clone()
                    },
                    size_mb: asset.size / (1024 * 1024),
                    sha256: None,
                    match_score: score as f64,
                    match_level: level,
                });
                if results.len() >= limit {
                    break 'repos;
                }
            }
        }

        dedupe_by_url(results, limit, MIN_PLATFORM_SCORE)
    }

    /// Latest release of a repo, degrading to `None` (a repo without
    /// releases is a 404 here).
    pub(crate) async fn latest_release(&self, full_name: &str) -> Option<Release> {
        let url = format!(
            "{}/repos/{full_name}/releases/latest",
            self.endpoints.github_api
        );
        self.fetch_json(self.github_headers(self.get(&url)), "github latest release")
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
