//! Shared HTTP plumbing for the platform searchers.
//!
//! One [`SearchClient`] is constructed at startup and shared by `Arc`;
//! it owns the HTTP client, the provider credentials, and the Hugging
//! Face tree cache. Provider requests degrade to `None` on any failure
//! with a logged warning, so a broken platform costs its own results
//! and nothing else.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::error::SearchError;
use crate::huggingface::HfTreeEntry;

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = "modelbay-downloader";

/// Per-platform API call timeout (seconds).
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;

/// Hugging Face token environment fallbacks, checked in order.
pub const HF_TOKEN_ENV_VARS: &[&str] =
    &["HUGGINGFACE_HUB_TOKEN", "HF_TOKEN", "HUGGINGFACE_TOKEN"];

/// GitHub API token environment fallbacks, checked in order.
pub const GITHUB_TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Per-request timeout; bounds how long one slow provider can stall
    /// its slot in the fan-out.
    pub timeout: Duration,
    /// Bearer token for Hugging Face API calls. Never logged.
    pub hf_token: Option<String>,
    /// Token for GitHub API calls. Never logged.
    pub github_token: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            hf_token: None,
            github_token: None,
        }
    }
}

impl SearchConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            hf_token: HF_TOKEN_ENV_VARS.iter().find_map(|name| env(name)),
            github_token: GITHUB_TOKEN_ENV_VARS.iter().find_map(|name| env(name)),
        }
    }
}

/// Base URLs of the queried services, overridable for tests.
#[derive(Debug, Clone)]
pub struct SearchEndpoints {
    pub civitai: String,
    pub huggingface: String,
    pub github_api: String,
    pub duckduckgo: String,
}

impl Default for SearchEndpoints {
    fn default() -> Self {
        Self {
            civitai: "https://civitai.com".to_string(),
            huggingface: "https://huggingface.co".to_string(),
            github_api: "https://api.github.com".to_string(),
            duckduckgo: "https://duckduckgo.com".to_string(),
        }
    }
}

/// HTTP client shared by all platform searchers.
#[derive(Debug)]
pub struct SearchClient {
    client: reqwest::Client,
    pub(crate) config: SearchConfig,
    pub(crate) endpoints: SearchEndpoints,
    /// Cached Hugging Face tree listings keyed by repo id.
    pub(crate) hf_tree_cache: Mutex<HashMap<String, (Instant, Vec<HfTreeEntry>)>>,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        Self::with_endpoints(config, SearchEndpoints::default())
    }

    /// Create a client against non-default service endpoints.
    pub fn with_endpoints(
        config: SearchConfig,
        endpoints: SearchEndpoints,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            endpoints,
            hf_tree_cache: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// Attach the Hugging Face bearer token when one is configured.
    pub(crate) fn hf_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.hf_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Attach the GitHub API version header and token when configured.
    pub(crate) fn github_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/vnd.github.v3+json");
        match &self.config.github_token {
            Some(token) => {
                request.header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            }
            None => request,
        }
    }

    /// Send a request and decode its JSON body, degrading to `None`
    /// with a warning on any failure.
    pub(crate) async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &'static str,
    ) -> Option<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(context, error = %e, "Search request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(context, status = %response.status(), "Search request returned an error status");
            return None;
        }
        match response.json::<T>().await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(context, error = %e, "Failed to decode search response");
                None
            }
        }
    }

    /// Send a request and return its body as text, degrading to `None`
    /// with a warning on any failure.
    pub(crate) async fn fetch_text(
        &self,
        request: reqwest::RequestBuilder,
        context: &'static str,
    ) -> Option<String> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(context, error = %e, "Search request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(context, status = %response.status(), "Search request returned an error status");
            return None;
        }
        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(context, error = %e, "Failed to read search response body");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_point_at_production_services() {
        let endpoints = SearchEndpoints::default();
        assert_eq!(endpoints.civitai, "https://civitai.com");
        assert_eq!(endpoints.huggingface, "https://huggingface.co");
        assert_eq!(endpoints.github_api, "https://api.github.com");
        assert_eq!(endpoints.duckduckgo, "https://duckduckgo.com");
    }

    #[test]
    fn default_config_has_no_tokens() {
        let config = SearchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS));
        assert!(config.hf_token.is_none());
        assert!(config.github_token.is_none());
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(SearchClient::new(SearchConfig::default()).is_ok());
    }
}
