/// Item-level download failures. These never abort the surrounding job;
/// the worker records them per item and moves on.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download exceeds size limit")]
    LimitExceeded,

    #[error("sha256 mismatch")]
    IntegrityMismatch,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
