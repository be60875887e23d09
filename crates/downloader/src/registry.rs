//! In-memory job registry.
//!
//! Shared mutable job state behind a single mutex, constructed once by
//! the embedding process and handed around by `Arc`. Readers always get
//! a snapshot clone, never a live reference, so status queries cannot
//! race an in-progress mutation. Finished jobs are purged lazily on the
//! next submission rather than by a background timer.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::job::DownloadJob;

/// Registry of live and recently finished download jobs.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, DownloadJob>>,
    retention_hours: i64,
}

impl JobRegistry {
    pub fn new(retention_hours: i64) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            retention_hours,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DownloadJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new queued job and return its id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.lock().insert(id.clone(), DownloadJob::new(id.clone()));
        id
    }

    /// Snapshot a job by id.
    pub fn get(&self, job_id: &str) -> Option<DownloadJob> {
        self.lock().get(job_id).cloned()
    }

    /// Mutate a job in place under the lock. Unknown ids are ignored
    /// (the job may have been purged while its worker was finishing).
    pub fn update(&self, job_id: &str, mutate: impl FnOnce(&mut DownloadJob)) {
        if let Some(job) = self.lock().get_mut(job_id) {
            mutate(job);
        }
    }

    /// Drop jobs older than the retention window. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(self.retention_hours);
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        let removed = before - jobs.len();
        drop(jobs);
        if removed > 0 {
            tracing::info!(removed, "Cleaned up old download jobs");
        }
        removed
    }

    /// Number of jobs currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
