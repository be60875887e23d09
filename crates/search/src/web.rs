//! Web-search-first discovery.
//!
//! A general DuckDuckGo HTML search scoped to the two big hosting
//! domains surfaces candidate model pages; each candidate link is then
//! resolved to structured model/file info through that platform's API
//! and kept only when it scores as a confident match. This finds models
//! whose hosting-platform search indexing is poor but whose pages rank
//! well on the open web.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use modelbay_core::matcher::{self, MatchProfile};
use modelbay_core::validate::basename;
use modelbay_core::ModelKind;

use crate::github::kind_from_asset_name;
use crate::http::SearchClient;
use crate::types::{is_weight_file, Platform, SearchResult, GOOD_SCORE};

/// DuckDuckGo blocks non-browser user agents on the HTML endpoint.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static HF_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*huggingface\.co/[^"]*)""#).expect("valid regex"));
static GH_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*github\.com/[^"]*)""#).expect("valid regex"));
static DDG_REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"uddg=([^&]+)").expect("valid regex"));
static HF_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?huggingface\.co/([^/]+)/([^/?#]+)").expect("valid regex")
});
static GH_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/]+)/([^/?#]+)").expect("valid regex")
});

/// Pull Hugging Face and GitHub hrefs out of a search result page,
/// Hugging Face links first.
pub(crate) fn extract_platform_links(html: &str) -> Vec<String> {
    HF_LINK_RE
        .captures_iter(html)
        .chain(GH_LINK_RE.captures_iter(html))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Unwrap a DuckDuckGo redirect link to its target URL.
pub(crate) fn unwrap_ddg_redirect(link: &str) -> String {
    match DDG_REDIRECT_RE.captures(link) {
        Some(caps) => caps[1].replace("%3A", ":").replace("%2F", "/"),
        None => link.to_string(),
    }
}

impl SearchClient {
    /// Discover confident matches via web search. Only results scoring
    /// at least [`GOOD_SCORE`] are returned.
    pub(crate) async fn search_web_first(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let url = format!("{}/html/", self.endpoints.duckduckgo);
        let search_query = format!("{query} site:huggingface.co OR site:github.com");
        let request = self
            .get(&url)
            .query(&[("q", search_query.as_str()), ("t", "h_"), ("ia", "web")])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT);
        let Some(html) = self.fetch_text(request, "web search").await else {
            return Vec::new();
        };

        let mut results = Vec::new();
        let mut processed = HashSet::new();
        // Follow more links than needed since many will not resolve to
        // a confident match.
        for link in extract_platform_links(&html).into_iter().take(limit * 2) {
            let link = unwrap_ddg_redirect(&link);
            if !processed.insert(link.clone()) {
                continue;
            }
            if let Some(info) = self.extract_model_info(&link, query).await {
                if info.match_score >= GOOD_SCORE {
                    tracing::info!(
                        name = %info.name,
                        score = info.match_score,
                        "Found good match from web search",
                    );
                    results.push(info);
                }
            }
            if results.len() >= limit {
                break;
            }
        }
        results
    }

    /// Resolve a candidate page URL to downloadable model info via the
    /// owning platform's API. Returns the first weight file scoring at
    /// least [`GOOD_SCORE`], or `None`.
    async fn extract_model_info(&self, url: &str, query: &str) -> Option<SearchResult> {
        let profile = MatchProfile::search_ranking();

        if let Some(caps) = HF_URL_RE.captures(url) {
            let full_name = format!("{}/{}", &caps[1], &caps[2]);
            for entry in self.fetch_tree(&full_name, false).await {
                if !is_weight_file(&entry.path) {
                    continue;
                }
                let filename = basename(&entry.path);
                let (score, level) = matcher::score(query, &full_name, &filename, &profile);
                if score as f64 >= GOOD_SCORE {
                    return Some(SearchResult {
                        platform: Platform::Huggingface,
                        name: full_name.clone(),
                        filename,
                        url: format!(
                            "{}/{full_name}/resolve/main/{}",
                            self.endpoints.huggingface, entry.path
                        ),
                        page_url: url.to_string(),
                        kind: ModelKind::Checkpoints,
                        version: "main".to_string(),
                        size_mb: 0,
                        sha256: None,
                        match_score: score as f64,
                        match_level: format!("{level} (web)"),
                    });
                }
            }
            return None;
        }

        if let Some(caps) = GH_URL_RE.captures(url) {
            let full_name = format!("{}/{}", &caps[1], &caps[2]);
            let release = self.latest_release(&full_name).await?;
            for asset in &release.assets {
                if !is_weight_file(&asset.name) || asset.browser_download_url.is_empty() {
                    continue;
                }
                let (score, level) = matcher::score(query, &full_name, &asset.name, &profile);
                if score as f64 >= GOOD_SCORE {
                    return Some(SearchResult {
                        platform: Platform::Github,
                        name: format!("{full_name} - {}", asset.name),
                        filename: asset.name.clone(),
                        url: asset.browser_download_url.clone(),
                        page_url: url.to_string(),
                        kind: kind_from_asset_name(&asset.name),
                        version: if release.tag_name.is_empty() {
                            "latest".to_string()
                        } else {
                            release.tag_name.clone()
                        },
                        size_mb: asset.size / (1024 * 1024),
                        sha256: None,
                        match_score: score as f64,
                        match_level: format!("{level} (web)"),
                    });
                }
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- extract_platform_links ----------------------------------------------

    #[test]
    fn links_extracted_hf_before_github() {
        let html = r#"
            <a href="https://github.com/org/repo">gh</a>
            <a href="https://huggingface.co/org/model">hf</a>
            <a href="https://example.com/other">no</a>
        "#;
        let links = extract_platform_links(html);
        assert_eq!(
            links,
            vec![
                "https://huggingface.co/org/model".to_string(),
                "https://github.com/org/repo".to_string(),
            ]
        );
    }

    #[test]
    fn no_links_in_unrelated_html() {
        assert!(extract_platform_links("<p>nothing here</p>").is_empty());
    }

    // -- unwrap_ddg_redirect -------------------------------------------------

    #[test]
    fn redirect_links_unwrap_to_target() {
        let link = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fhuggingface.co%2Forg%2Fmodel&rut=abc";
        assert_eq!(unwrap_ddg_redirect(link), "https://huggingface.co/org/model");
    }

    #[test]
    fn direct_links_pass_through() {
        let link = "https://huggingface.co/org/model";
        assert_eq!(unwrap_ddg_redirect(link), link);
    }

    // -- page url patterns ---------------------------------------------------

    #[test]
    fn hf_and_gh_page_patterns() {
        let caps = HF_URL_RE
            .captures("https://huggingface.co/runwayml/stable-diffusion-v1-5?lang=en")
            .unwrap();
        assert_eq!(&caps[1], "runwayml");
        assert_eq!(&caps[2], "stable-diffusion-v1-5");

        let caps = GH_URL_RE.captures("http://www.github.com/org/repo/releases").unwrap();
        assert_eq!(&caps[1], "org");
        assert_eq!(&caps[2], "repo");

        assert!(HF_URL_RE.captures("https://huggingface.co/models").is_none());
        assert!(GH_URL_RE.captures("https://example.com/org/repo").is_none());
    }
}
