//! Search result types shared by the platform searchers and the
//! aggregator.

use serde::Serialize;

use modelbay_core::ModelKind;

/// Results scoring below this are dropped from single-platform
/// searches.
pub const MIN_PLATFORM_SCORE: f64 = 30.0;

/// Threshold for a result to count as a confident match.
pub const GOOD_SCORE: f64 = 80.0;

/// Threshold at which the aggregator stops trying further variants.
pub const EXCELLENT_SCORE: f64 = 95.0;

/// Model-hosting platform a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Civitai,
    Huggingface,
    Github,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Civitai => "civitai",
            Self::Huggingface => "huggingface",
            Self::Github => "github",
        })
    }
}

/// One scored, downloadable search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub platform: Platform,
    pub name: String,
    pub filename: String,
    /// Direct download URL.
    pub url: String,
    /// Human-facing page for the result.
    pub page_url: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub version: String,
    pub size_mb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub match_score: f64,
    /// Diagnostic description of how the score was reached.
    pub match_level: String,
}

/// Per-platform result lists, each already deduplicated and capped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformResults {
    pub civitai: Vec<SearchResult>,
    pub huggingface: Vec<SearchResult>,
    pub github: Vec<SearchResult>,
}

/// The assembled outcome of a multi-platform search.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSearch {
    pub query: String,
    pub total_results: usize,
    pub platforms: PlatformResults,
    /// All platform results in one globally score-sorted list.
    pub sorted_results: Vec<SearchResult>,
    /// Manual-search fallback for the user when nothing matched.
    pub google_search_url: String,
}

/// Sort results by score, highest first. Ties keep their order.
pub(crate) fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Deduplicate by download URL keeping the highest-scoring duplicate,
/// drop everything under `min_score`, and cap at `max` results.
pub(crate) fn dedupe_by_url(
    mut results: Vec<SearchResult>,
    max: usize,
    min_score: f64,
) -> Vec<SearchResult> {
    sort_by_score(&mut results);
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for result in results {
        if result.match_score < min_score {
            continue;
        }
        if result.url.is_empty() || !seen.insert(result.url.clone()) {
            continue;
        }
        unique.push(result);
        if unique.len() >= max {
            break;
        }
    }
    unique
}

/// Whether a filename (or relative path) ends in a known weight-file
/// extension.
pub(crate) fn is_weight_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    modelbay_core::validate::ALLOWED_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, score: f64) -> SearchResult {
        SearchResult {
            platform: Platform::Huggingface,
            name: "name".into(),
            filename: "f.safetensors".into(),
            url: url.into(),
            page_url: String::new(),
            kind: ModelKind::Checkpoints,
            version: "main".into(),
            size_mb: 0,
            sha256: None,
            match_score: score,
            match_level: "test".into(),
        }
    }

    // -- dedupe_by_url -------------------------------------------------------

    #[test]
    fn dedupe_keeps_highest_scoring_duplicate() {
        let out = dedupe_by_url(
            vec![result("u1", 85.0), result("u1", 92.0), result("u2", 88.0)],
            10,
            MIN_PLATFORM_SCORE,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "u1");
        assert_eq!(out[0].match_score, 92.0);
        assert_eq!(out[1].url, "u2");
    }

    #[test]
    fn dedupe_filters_below_threshold_and_caps() {
        let out = dedupe_by_url(
            vec![
                result("u1", 95.0),
                result("u2", 90.0),
                result("u3", 85.0),
                result("u4", 20.0),
            ],
            2,
            GOOD_SCORE,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "u1");
        assert_eq!(out[1].url, "u2");
    }

    #[test]
    fn dedupe_drops_empty_urls() {
        let out = dedupe_by_url(vec![result("", 99.0)], 10, MIN_PLATFORM_SCORE);
        assert!(out.is_empty());
    }

    // -- serde ---------------------------------------------------------------

    #[test]
    fn result_serializes_kind_as_type() {
        let json = serde_json::to_value(result("u", 50.0)).unwrap();
        assert_eq!(json["type"], "checkpoints");
        assert_eq!(json["platform"], "huggingface");
        assert!(json.get("sha256").is_none());
    }

    // -- is_weight_file ------------------------------------------------------

    #[test]
    fn weight_file_extensions() {
        assert!(is_weight_file("model.safetensors"));
        assert!(is_weight_file("sub/dir/model.CKPT"));
        assert!(!is_weight_file("readme.md"));
        assert!(!is_weight_file("model.zip"));
    }
}
