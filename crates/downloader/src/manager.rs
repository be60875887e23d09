//! The download manager: batch submission and the background worker.
//!
//! `submit` validates a whole batch up front (one bad item rejects the
//! batch, nothing is created), registers a queued job, and spawns one
//! task that downloads the items strictly sequentially. Per-item
//! failures are recorded on the job and never abort the remaining
//! items; the job ends `Error` iff any item errored.
//!
//! Placement is atomic in two hops: the stream lands in
//! `<models-root>/.modelbay_tmp/<job_id>/<name>.part`, is renamed to
//! its final name inside the temp directory, then renamed into the
//! target directory. A crash never leaves a partial file at the final
//! path, and job-scoped temp directories keep concurrent jobs from
//! colliding on equal filenames.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use modelbay_core::redact::redact_secret;
use modelbay_core::validate::{validate_item, DownloadItem, RawDownloadItem};
use modelbay_core::CoreError;
use modelbay_store::ModelLibrary;

use crate::auth::{bearer_for, USER_AGENT};
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::job::{DownloadJob, ItemResult, ItemStatus, JobState, Progress, Summary};
use crate::registry::JobRegistry;

/// Maximum items per submitted batch.
pub const MAX_ITEMS: usize = 50;

/// Progress is pushed to the registry at this byte granularity.
const PROGRESS_STEP: u64 = 1024 * 1024;

/// Name of the temp directory under the models root.
const TMP_DIR_NAME: &str = ".modelbay_tmp";

/// Background download job manager.
///
/// Constructed once at startup and shared by `Arc`; owns the HTTP
/// client, the library layout handle, and the job registry.
#[derive(Debug)]
pub struct DownloadManager {
    registry: Arc<JobRegistry>,
    library: ModelLibrary,
    config: DownloadConfig,
    client: reqwest::Client,
}

impl DownloadManager {
    pub fn new(
        registry: Arc<JobRegistry>,
        library: ModelLibrary,
        config: DownloadConfig,
    ) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            registry,
            library,
            config,
            client,
        })
    }

    /// Validate and submit a batch of download requests.
    ///
    /// Any invalid item rejects the whole batch with the failing rule;
    /// duplicate keys keep the first occurrence. On success a queued
    /// job is registered, expired jobs are purged, and a worker task is
    /// spawned. Returns the opaque job id.
    pub fn submit(self: &Arc<Self>, raw_items: &[RawDownloadItem]) -> Result<String, CoreError> {
        if raw_items.is_empty() {
            return Err(CoreError::Validation(
                "items must be a non-empty list".to_string(),
            ));
        }
        if raw_items.len() > MAX_ITEMS {
            return Err(CoreError::Validation("too many items".to_string()));
        }

        let mut items: Vec<DownloadItem> = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            let item = validate_item(raw)?;
            if items.iter().any(|existing| existing.key == item.key) {
                continue;
            }
            items.push(item);
        }

        self.registry.purge_expired();
        let job_id = self.registry.create();

        let manager = Arc::clone(self);
        let worker_job_id = job_id.clone();
        tokio::spawn(async move {
            manager.run_job(&worker_job_id, items).await;
        });

        Ok(job_id)
    }

    /// Snapshot a job's current state.
    pub fn status(&self, job_id: &str) -> Option<DownloadJob> {
        self.registry.get(job_id)
    }

    fn temp_dir(&self, job_id: &str) -> PathBuf {
        self.library.models_root().join(TMP_DIR_NAME).join(job_id)
    }

    async fn run_job(&self, job_id: &str, items: Vec<DownloadItem>) {
        let mut summary = Summary::default();
        let total_items = items.len();

        for (index, item) in items.iter().enumerate() {
            match self.download_single(job_id, item, index + 1, total_items).await {
                Ok(result) => {
                    match result.status {
                        ItemStatus::Ok => summary.downloaded += 1,
                        ItemStatus::Skipped => summary.skipped += 1,
                        ItemStatus::Error => summary.errors += 1,
                    }
                    self.registry.update(job_id, |job| job.results.push(result));
                }
                Err(e) => {
                    let error = self.sanitize(&e.to_string(), item);
                    tracing::warn!(key = %item.key, error = %error, "Download failed");
                    summary.errors += 1;
                    self.registry.update(job_id, |job| {
                        job.results.push(ItemResult {
                            key: item.key.clone(),
                            filename: item.filename.clone(),
                            status: ItemStatus::Error,
                            path: None,
                            reason: None,
                            error: Some(error),
                        });
                    });
                }
            }
        }

        let state = if summary.errors == 0 {
            JobState::Done
        } else {
            JobState::Error
        };
        let message = format!(
            "Downloaded {}, skipped {}, errors {}",
            summary.downloaded, summary.skipped, summary.errors
        );
        self.registry.update(job_id, |job| {
            job.state = state;
            job.message = message.clone();
            job.summary = summary;
        });

        let _ = std::fs::remove_dir_all(self.temp_dir(job_id));
        tracing::info!(job_id = %job_id, message = %message, "Download job finished");
    }

    async fn download_single(
        &self,
        job_id: &str,
        item: &DownloadItem,
        index: usize,
        total_items: usize,
    ) -> Result<ItemResult, DownloadError> {
        let target_dir = self.library.resolve_dir(item.kind);
        std::fs::create_dir_all(&target_dir)?;

        let target_path = target_dir.join(&item.filename);
        if target_path.exists() {
            return Ok(ItemResult {
                key: item.key.clone(),
                filename: item.filename.clone(),
                status: ItemStatus::Skipped,
                path: Some(target_path.display().to_string()),
                reason: Some("exists".to_string()),
                error: None,
            });
        }

        let tmp_dir = self.temp_dir(job_id);
        std::fs::create_dir_all(&tmp_dir)?;
        let part_path = tmp_dir.join(format!("{}.part", item.filename));
        if part_path.exists() {
            let _ = std::fs::remove_file(&part_path);
        }

        self.registry.update(job_id, |job| {
            job.state = JobState::Downloading;
            job.message = format!("{index}/{total_items} downloading {}", item.filename);
        });

        if let Err(e) = self.stream_to_part(job_id, item, &part_path).await {
            let _ = std::fs::remove_file(&part_path);
            return Err(e);
        }

        let final_tmp = tmp_dir.join(&item.filename);
        std::fs::rename(&part_path, &final_tmp)?;
        std::fs::rename(&final_tmp, &target_path)?;
        tracing::info!(filename = %item.filename, path = %target_path.display(), "Downloaded model file");

        Ok(ItemResult {
            key: item.key.clone(),
            filename: item.filename.clone(),
            status: ItemStatus::Ok,
            path: Some(target_path.display().to_string()),
            reason: None,
            error: None,
        })
    }

    /// Stream the response body into the `.part` file, enforcing the
    /// byte ceiling on both the declared length and the measured count,
    /// and verifying the expected checksum incrementally.
    async fn stream_to_part(
        &self,
        job_id: &str,
        item: &DownloadItem,
        part_path: &Path,
    ) -> Result<(), DownloadError> {
        let mut request = self.client.get(&item.url);
        if let Some(token) = bearer_for(
            &item.url,
            item.token.as_deref(),
            self.config.fallback_token.as_deref(),
        ) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let total = response.content_length().unwrap_or(0);
        if total > self.config.max_bytes {
            return Err(DownloadError::LimitExceeded);
        }

        let mut hasher = item.sha256.as_ref().map(|_| Sha256::new());
        let mut file = tokio::fs::File::create(part_path).await?;
        let mut downloaded: u64 = 0;
        let mut last_reported: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            downloaded += chunk.len() as u64;
            if downloaded > self.config.max_bytes {
                return Err(DownloadError::LimitExceeded);
            }
            if downloaded - last_reported >= PROGRESS_STEP {
                last_reported = downloaded;
                self.registry.update(job_id, |job| {
                    job.progress = progress_of(downloaded, total);
                });
            }
        }
        file.flush().await?;
        self.registry.update(job_id, |job| {
            job.progress = progress_of(downloaded, total);
        });

        if let (Some(expected), Some(hasher)) = (&item.sha256, hasher) {
            let digest = format!("{:x}", hasher.finalize());
            if !digest.eq_ignore_ascii_case(expected) {
                return Err(DownloadError::IntegrityMismatch);
            }
        }
        Ok(())
    }

    /// Strip any credential that could appear in an error message before
    /// it is stored on the job or logged.
    fn sanitize(&self, message: &str, item: &DownloadItem) -> String {
        let mut out = message.to_string();
        if let Some(token) = &item.token {
            out = redact_secret(&out, token);
        }
        if let Some(token) = &self.config.fallback_token {
            out = redact_secret(&out, token);
        }
        out
    }
}

fn progress_of(current: u64, total: u64) -> Progress {
    let pct = if total > 0 {
        ((current.saturating_mul(100)) / total).min(100) as u8
    } else {
        0
    };
    Progress {
        current,
        total,
        pct,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
