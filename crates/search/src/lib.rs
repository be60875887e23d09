//! Multi-platform online model search and missing-model resolution.
//!
//! Fans a query out to CivitAI, Hugging Face, and GitHub — preceded by
//! a web-search discovery pass — using generated query variants,
//! deduplicates results by download URL, and produces a globally ranked
//! result set. Also resolves missing-model references against the
//! recipe store, optionally auto-searching for unresolved entries.
//!
//! Provider failures degrade to empty result lists with a logged
//! warning; one slow or unreachable platform never aborts the
//! aggregate.

pub mod aggregator;
pub mod civitai;
pub mod error;
pub mod github;
pub mod http;
pub mod huggingface;
pub mod resolve;
pub mod types;
pub mod variants;
pub mod web;

pub use error::SearchError;
pub use http::{SearchClient, SearchConfig, SearchEndpoints};
pub use resolve::{resolve_missing, ResolvedMissing};
pub use types::{AggregatedSearch, Platform, PlatformResults, SearchResult};
