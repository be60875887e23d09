/// Errors from the search layer.
///
/// Provider failures during a search degrade to empty result lists
/// rather than surfacing here; this covers client construction only.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
