//! JSON-backed persistence and on-disk reconciliation for the model
//! library: atomic JSON helpers, the kind-to-directory layout, the
//! download-recipe store, the content-fingerprint cache, and fuzzy
//! candidate scanning.

pub mod candidates;
pub mod error;
pub mod fingerprints;
pub mod fs;
pub mod library;
pub mod recipes;

pub use error::StoreError;
pub use library::ModelLibrary;
pub use recipes::RecipeStore;
