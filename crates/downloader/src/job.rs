//! Download job state.
//!
//! One job tracks one submitted batch. The worker mutates the job in
//! place through the registry as items complete; once the state reaches
//! `Done` or `Error` the job is immutable and only awaits retention
//! cleanup. Jobs are never persisted to disk.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a download job: `Queued → Downloading → {Done, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Downloading,
    Done,
    Error,
}

impl JobState {
    /// Whether the state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Byte-level progress of the item currently downloading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub pct: u8,
}

/// Aggregate outcome counts for a finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub downloaded: u32,
    pub errors: u32,
    pub skipped: u32,
}

/// Outcome of a single item within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Skipped,
    Error,
}

/// Per-item result recorded on the job.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub key: String,
    pub filename: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One submitted batch, tracked as a single progress/state unit.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub id: String,
    pub state: JobState,
    pub progress: Progress,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub summary: Summary,
    pub results: Vec<ItemResult>,
}

impl DownloadJob {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            state: JobState::Queued,
            progress: Progress::default(),
            message: String::new(),
            created_at: Utc::now(),
            summary: Summary::default(),
            results: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
