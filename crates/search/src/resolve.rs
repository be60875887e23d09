//! Missing-model resolution with optional online auto-search.
//!
//! Resolution against the recipe store is a pure lookup; this layer
//! adds what the store deliberately does not know: kind inference from
//! workflow type hints, and (when asked) a best-effort online search
//! for entries no recipe covers.

use std::sync::Arc;

use serde::Serialize;

use modelbay_core::{CoreError, ModelKind};
use modelbay_store::recipes::{MissingRef, Recipe};
use modelbay_store::RecipeStore;

use crate::http::SearchClient;
use crate::types::SearchResult;

/// Maximum missing entries per resolution call.
pub const MAX_MISSING: usize = 200;

/// Resolution outcome for one missing reference.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMissing {
    pub missing_value: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModelKind>,
    pub recipe: Option<Recipe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_search_result: Option<SearchResult>,
}

/// Resolve missing references against the recipe store.
///
/// Entries without a recipe get their kind inferred from the type hint,
/// or, with `auto_search`, the best online result attached (searching
/// by the extension-stripped key, one result per platform). A failed
/// search degrades to an unresolved entry rather than failing the call.
pub async fn resolve_missing(
    store: &RecipeStore,
    client: &Arc<SearchClient>,
    missing: &[MissingRef],
    auto_search: bool,
) -> Result<Vec<ResolvedMissing>, CoreError> {
    if missing.len() > MAX_MISSING {
        return Err(CoreError::Validation(format!(
            "missing exceeds limit ({MAX_MISSING})"
        )));
    }

    let resolved = store.resolve(missing);
    let mut out = Vec::with_capacity(resolved.len());
    for (entry, request) in resolved.into_iter().zip(missing) {
        let mut kind = entry.kind;
        let mut auto_search_result = None;

        if entry.recipe.is_none() && !entry.key.is_empty() {
            if auto_search {
                let query = entry
                    .key
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(&entry.key)
                    .to_string();
                match client.search_all(&query, 1).await {
                    Ok(aggregated) => {
                        if let Some(best) = aggregated.sorted_results.into_iter().next() {
                            kind = Some(best.kind);
                            auto_search_result = Some(best);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(key = %entry.key, error = %e, "Auto-search failed");
                    }
                }
            } else {
                let hint = request.type_hint.as_deref().unwrap_or("");
                kind = kind.or_else(|| ModelKind::from_type_hint(hint));
            }
        }

        out.push(ResolvedMissing {
            missing_value: entry.missing_value,
            key: entry.key,
            kind,
            recipe: entry.recipe,
            auto_search_result,
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
