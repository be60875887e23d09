//! Pure domain logic for the model library: the category taxonomy,
//! download-item validation, fuzzy name matching, URL helpers, and
//! credential redaction. No I/O lives here; everything is a pure
//! function over its inputs so the higher crates stay testable.

pub mod error;
pub mod kinds;
pub mod matcher;
pub mod redact;
pub mod urls;
pub mod validate;

pub use error::CoreError;
pub use kinds::{ModelKind, ALL_KINDS};
pub use validate::{DownloadItem, RawDownloadItem};
