//! Multi-platform search aggregation.
//!
//! Per query variant, a web-first discovery pass runs before the direct
//! platform APIs; the API fan-out queries all three platforms
//! concurrently and is skipped entirely once the web pass produced
//! enough confident results. Platform lists are deduplicated by
//! download URL, capped, and concatenated in fixed priority order
//! (Hugging Face, GitHub, CivitAI), with a globally sorted flat list
//! alongside.

use std::sync::Arc;

use modelbay_core::CoreError;

use crate::http::SearchClient;
use crate::types::{
    dedupe_by_url, sort_by_score, AggregatedSearch, Platform, PlatformResults, SearchResult,
    EXCELLENT_SCORE, GOOD_SCORE,
};
use crate::variants::generate_variants;

/// Default per-platform result cap.
pub const DEFAULT_LIMIT: usize = 3;

/// Upper bound for the per-platform cap; requests clamp into range.
pub const MAX_LIMIT: usize = 10;

/// Candidate links followed per web-first pass.
const WEB_LIMIT: usize = 10;

/// Below this many good web results the API fan-out still runs.
const MIN_WEB_GOOD: usize = 3;

/// Variant iteration stops once this many good results accumulated.
const ENOUGH_GOOD: usize = 5;

/// Score bonus for Hugging Face API results; API hits carry structured
/// file info, and Hugging Face metadata is the most reliable.
const HF_PRIORITY_BONUS: f64 = 5.0;

/// Score bonus for GitHub API results.
const GH_PRIORITY_BONUS: f64 = 3.0;

impl SearchClient {
    /// Search all platforms for a model matching `query`.
    ///
    /// `limit_per_platform` is clamped to `1..=`[`MAX_LIMIT`]; queries
    /// under two characters are rejected.
    pub async fn search_all(
        self: &Arc<Self>,
        query: &str,
        limit_per_platform: usize,
    ) -> Result<AggregatedSearch, CoreError> {
        let query = query.trim().to_string();
        if query.chars().count() < 2 {
            return Err(CoreError::Validation(
                "query must be at least 2 characters".to_string(),
            ));
        }
        let limit = limit_per_platform.clamp(1, MAX_LIMIT);

        let variants = generate_variants(&query);
        tracing::info!(query = %query, ?variants, "Searching all platforms");

        let mut huggingface: Vec<SearchResult> = Vec::new();
        let mut github: Vec<SearchResult> = Vec::new();
        let mut civitai: Vec<SearchResult> = Vec::new();

        for variant in &variants {
            let web_results = self.search_web_first(variant, WEB_LIMIT).await;
            let excellent = web_results
                .iter()
                .any(|r| r.match_score >= EXCELLENT_SCORE);
            for result in web_results {
                match result.platform {
                    Platform::Huggingface => huggingface.push(result),
                    Platform::Github => github.push(result),
                    Platform::Civitai => civitai.push(result),
                }
            }
            if excellent {
                tracing::info!(variant = %variant, "Excellent web result, skipping further variants");
                break;
            }
        }

        let hf_limit = limit * 2;
        let gh_limit = limit * 2;
        let civitai_limit = limit;

        let good_web = huggingface
            .iter()
            .chain(github.iter())
            .filter(|r| r.match_score >= GOOD_SCORE)
            .count();

        if good_web < MIN_WEB_GOOD {
            tracing::info!(
                good_web,
                "Web search found too few good results, querying platform APIs",
            );
            for variant in &variants {
                let hf_task = {
                    let client = Arc::clone(self);
                    let q = variant.clone();
                    tokio::spawn(async move { client.search_huggingface(&q, hf_limit).await })
                };
                let gh_task = {
                    let client = Arc::clone(self);
                    let q = variant.clone();
                    tokio::spawn(async move { client.search_github(&q, gh_limit).await })
                };
                let civitai_task = {
                    let client = Arc::clone(self);
                    let q = variant.clone();
                    tokio::spawn(async move { client.search_civitai(&q, civitai_limit).await })
                };
                let (hf, gh, civ) = tokio::join!(hf_task, gh_task, civitai_task);
                let mut hf = hf.unwrap_or_default();
                let mut gh = gh.unwrap_or_default();
                let mut civ = civ.unwrap_or_default();

                hf.retain(|r| r.match_score >= GOOD_SCORE);
                gh.retain(|r| r.match_score >= GOOD_SCORE);
                civ.retain(|r| r.match_score >= GOOD_SCORE);

                for result in &mut hf {
                    result.match_score = (result.match_score + HF_PRIORITY_BONUS).min(100.0);
                    result.match_level = format!("{} [api+hf_priority]", result.match_level);
                }
                for result in &mut gh {
                    result.match_score = (result.match_score + GH_PRIORITY_BONUS).min(100.0);
                    result.match_level = format!("{} [api+gh_priority]", result.match_level);
                }

                huggingface.extend(hf);
                github.extend(gh);
                civitai.extend(civ);

                let good_total = huggingface
                    .iter()
                    .chain(github.iter())
                    .filter(|r| r.match_score >= GOOD_SCORE)
                    .count();
                if good_total >= ENOUGH_GOOD {
                    tracing::info!(variant = %variant, "Enough good results, stopping variant search");
                    break;
                }
            }
        }

        let platforms = PlatformResults {
            huggingface: dedupe_by_url(huggingface, hf_limit, GOOD_SCORE),
            github: dedupe_by_url(github, gh_limit, GOOD_SCORE),
            civitai: dedupe_by_url(civitai, civitai_limit, GOOD_SCORE),
        };
        let mut sorted_results: Vec<SearchResult> = platforms
            .huggingface
            .iter()
            .chain(platforms.github.iter())
            .chain(platforms.civitai.iter())
            .cloned()
            .collect();
        sort_by_score(&mut sorted_results);
        tracing::info!(
            total = sorted_results.len(),
            huggingface = platforms.huggingface.len(),
            github = platforms.github.len(),
            civitai = platforms.civitai.len(),
            "Search finished",
        );

        Ok(AggregatedSearch {
            query: query.clone(),
            total_results: sorted_results.len(),
            platforms,
            sorted_results,
            google_search_url: google_fallback_url(&query),
        })
    }
}

/// Manual Google search URL offered alongside the results.
fn google_fallback_url(query: &str) -> String {
    let q = format!("{query} download safetensors OR ckpt");
    reqwest::Url::parse_with_params("https://www.google.com/search", [("q", q.as_str())])
        .map(|url| url.to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
