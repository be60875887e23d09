//! End-to-end download job scenarios against a local mock server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use sha2::{Digest, Sha256};

use modelbay_core::RawDownloadItem;
use modelbay_downloader::job::{ItemStatus, JobState};
use modelbay_downloader::{DownloadConfig, DownloadJob, DownloadManager, JobRegistry};
use modelbay_store::ModelLibrary;

fn manager_with(root: &Path, max_bytes: u64) -> Arc<DownloadManager> {
    let registry = Arc::new(JobRegistry::new(1));
    let library = ModelLibrary::new(root);
    let config = DownloadConfig {
        timeout: Duration::from_secs(10),
        max_bytes,
        retention_hours: 1,
        fallback_token: None,
    };
    Arc::new(DownloadManager::new(registry, library, config).unwrap())
}

fn item(key: &str, url: String, kind: &str, filename: &str) -> RawDownloadItem {
    RawDownloadItem {
        key: key.to_string(),
        url,
        kind: kind.to_string(),
        filename: filename.to_string(),
        ..Default::default()
    }
}

async fn wait_for_terminal(manager: &DownloadManager, job_id: &str) -> DownloadJob {
    for _ in 0..500 {
        if let Some(job) = manager.status(job_id) {
            if job.state.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn downloads_single_item_end_to_end() {
    let server = MockServer::start_async().await;
    let body = b"model weight bytes";
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/x.safetensors");
            then.status(200).body(body);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let job_id = manager
        .submit(&[item(
            "a",
            server.url("/x.safetensors"),
            "checkpoint",
            "x.safetensors",
        )])
        .unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.summary.downloaded, 1);
    assert_eq!(job.summary.errors, 0);
    assert_eq!(job.summary.skipped, 0);
    assert_eq!(job.progress.current, body.len() as u64);

    let target = root.path().join("checkpoints/x.safetensors");
    assert_eq!(std::fs::read(&target).unwrap(), body);
    assert!(!root.path().join(".modelbay_tmp").join(&job_id).exists());
    mock.assert_async().await;
}

#[tokio::test]
async fn checksum_mismatch_fails_item_and_leaves_no_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/bad.safetensors");
            then.status(200).body(b"not what was promised");
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let mut raw = item(
        "bad",
        server.url("/bad.safetensors"),
        "loras",
        "bad.safetensors",
    );
    raw.sha256 = "a".repeat(64);
    let job_id = manager.submit(&[raw]).unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.summary.errors, 1);
    assert_eq!(job.results[0].status, ItemStatus::Error);
    assert_eq!(job.results[0].error.as_deref(), Some("sha256 mismatch"));

    assert!(!root.path().join("loras/bad.safetensors").exists());
    assert!(!root.path().join(".modelbay_tmp").join(&job_id).exists());
}

#[tokio::test]
async fn matching_checksum_passes() {
    let server = MockServer::start_async().await;
    let body = b"verified payload";
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v.ckpt");
            then.status(200).body(body);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let mut raw = item("v", server.url("/v.ckpt"), "vae", "v.ckpt");
    raw.sha256 = format!("{:x}", Sha256::digest(body)).to_uppercase();
    let job_id = manager.submit(&[raw]).unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.summary.downloaded, 1);
    assert!(root.path().join("vae/v.ckpt").is_file());
}

#[tokio::test]
async fn existing_target_is_skipped_and_untouched() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/x.safetensors");
            then.status(200).body(b"new bytes from server");
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("loras")).unwrap();
    std::fs::write(root.path().join("loras/x.safetensors"), b"original bytes").unwrap();

    let manager = manager_with(root.path(), 1 << 30);
    let job_id = manager
        .submit(&[item(
            "x",
            server.url("/x.safetensors"),
            "loras",
            "x.safetensors",
        )])
        .unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.summary.skipped, 1);
    assert_eq!(job.summary.downloaded, 0);
    assert_eq!(job.results[0].status, ItemStatus::Skipped);
    assert_eq!(job.results[0].reason.as_deref(), Some("exists"));

    assert_eq!(
        std::fs::read(root.path().join("loras/x.safetensors")).unwrap(),
        b"original bytes"
    );
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn declared_size_over_cap_aborts_item() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/big.safetensors");
            then.status(200).body(vec![0u8; 256]);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 64);

    let job_id = manager
        .submit(&[item(
            "big",
            server.url("/big.safetensors"),
            "checkpoints",
            "big.safetensors",
        )])
        .unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.summary.errors, 1);
    assert_eq!(
        job.results[0].error.as_deref(),
        Some("download exceeds size limit")
    );
    assert!(!root.path().join("checkpoints/big.safetensors").exists());
    assert!(!root.path().join(".modelbay_tmp").join(&job_id).exists());
}

#[tokio::test]
async fn one_failed_item_does_not_abort_the_rest() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ok.safetensors");
            then.status(200).body(b"fine");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone.safetensors");
            then.status(404);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let job_id = manager
        .submit(&[
            item(
                "gone",
                server.url("/gone.safetensors"),
                "loras",
                "gone.safetensors",
            ),
            item("ok", server.url("/ok.safetensors"), "loras", "ok.safetensors"),
        ])
        .unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.summary.errors, 1);
    assert_eq!(job.summary.downloaded, 1);
    assert!(root.path().join("loras/ok.safetensors").is_file());
    assert!(!root.path().join("loras/gone.safetensors").exists());
}

#[tokio::test]
async fn duplicate_keys_keep_first_occurrence() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/dup.safetensors");
            then.status(200).body(b"once");
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let job_id = manager
        .submit(&[
            item(
                "dup",
                server.url("/dup.safetensors"),
                "loras",
                "dup.safetensors",
            ),
            item(
                "dup",
                server.url("/dup.safetensors"),
                "loras",
                "dup.safetensors",
            ),
        ])
        .unwrap();

    let job = wait_for_terminal(&manager, &job_id).await;
    assert_eq!(job.results.len(), 1);
    assert_eq!(job.summary.downloaded, 1);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn invalid_item_rejects_whole_batch() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/ok.safetensors");
            then.status(200).body(b"fine");
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let result = manager.submit(&[
        item("ok", server.url("/ok.safetensors"), "loras", "ok.safetensors"),
        item(
            "bad",
            server.url("/bad.safetensors"),
            "warp_field",
            "bad.safetensors",
        ),
    ]);
    assert!(result.is_err());

    // Nothing was started for the valid item either.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.hits_async().await, 0);
    assert!(!root.path().join("loras/ok.safetensors").exists());
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);
    assert!(manager.submit(&[]).is_err());
}

#[tokio::test]
async fn concurrent_jobs_with_same_filename_do_not_collide() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/a/shared.safetensors");
            then.status(200).body(b"payload for job a");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/b/shared.safetensors");
            then.status(200).body(b"payload for job b");
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);

    let job_a = manager
        .submit(&[item(
            "a",
            server.url("/a/shared.safetensors"),
            "loras",
            "shared.safetensors",
        )])
        .unwrap();
    let job_b = manager
        .submit(&[item(
            "b",
            server.url("/b/shared.safetensors"),
            "vae",
            "shared.safetensors",
        )])
        .unwrap();

    let a = wait_for_terminal(&manager, &job_a).await;
    let b = wait_for_terminal(&manager, &job_b).await;
    assert_eq!(a.state, JobState::Done);
    assert_eq!(b.state, JobState::Done);

    assert_eq!(
        std::fs::read(root.path().join("loras/shared.safetensors")).unwrap(),
        b"payload for job a"
    );
    assert_eq!(
        std::fs::read(root.path().join("vae/shared.safetensors")).unwrap(),
        b"payload for job b"
    );
}

#[tokio::test]
async fn unknown_job_id_has_no_status() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(root.path(), 1 << 30);
    assert!(manager.status("not-a-job").is_none());
}
