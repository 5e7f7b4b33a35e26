//! Integration tests for digest verification and the file sink through the engine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use futures_util::StreamExt;
use rangefetch_core::download::{
    DownloadEngine, DownloadError, DownloadOptions, DownloadTarget, ExpectedDigest,
    HashAlgorithm, HttpClient, RangeLimits,
};
use sha2::{Digest, Sha256};
use support::range_server::{RangeResponder, ranged_origin, resource_url, test_content};
use tempfile::TempDir;

const CONTENT_LEN: usize = 60_000;

fn engine() -> DownloadEngine {
    let options = DownloadOptions {
        worker_count: 3,
        range_limits: RangeLimits {
            min_range_bytes: 10_000,
            max_range_bytes: 1_000_000,
        },
        ..DownloadOptions::default()
    };
    DownloadEngine::new(HttpClient::new(), options).unwrap()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

const WRONG_SHA256: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[tokio::test]
async fn test_verified_download_passes_with_matching_digest() {
    let content = test_content(CONTENT_LEN);
    let server = ranged_origin(RangeResponder::new(content.clone()), CONTENT_LEN).await;
    let target = DownloadTarget::new(&resource_url(&server)).unwrap();
    let expected = ExpectedDigest::new(HashAlgorithm::Sha256, &sha256_hex(&content)).unwrap();

    let mut stream = engine().download_verified(&target, expected).await.unwrap();
    let mut data = Vec::new();
    while let Some(item) = stream.next().await {
        data.extend_from_slice(&item.unwrap());
    }
    assert!(data == content);
}

#[tokio::test]
async fn test_verified_download_reports_mismatch_last() {
    let content = test_content(CONTENT_LEN);
    let server = ranged_origin(RangeResponder::new(content.clone()), CONTENT_LEN).await;
    let target = DownloadTarget::new(&resource_url(&server)).unwrap();
    let expected = ExpectedDigest::new(HashAlgorithm::Sha256, WRONG_SHA256).unwrap();

    let mut stream = engine().download_verified(&target, expected).await.unwrap();
    let mut delivered = 0;
    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => delivered += bytes.len(),
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    assert_eq!(delivered, CONTENT_LEN);
    match failure {
        Some(DownloadError::HashMismatch {
            algorithm,
            expected,
            actual,
            ..
        }) => {
            assert_eq!(algorithm, "sha256");
            assert_eq!(expected, WRONG_SHA256);
            assert_eq!(actual, sha256_hex(&content));
        }
        other => panic!("expected HashMismatch, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_download_to_file_writes_verified_content() {
    let content = test_content(CONTENT_LEN);
    let server = ranged_origin(RangeResponder::new(content.clone()), CONTENT_LEN).await;
    let target = DownloadTarget::new(&resource_url(&server)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resource.bin");
    let expected = ExpectedDigest::parse(&format!("sha256:{}", sha256_hex(&content))).unwrap();

    let written = engine()
        .download_to_file(&target, &path, Some(expected))
        .await
        .unwrap();

    assert_eq!(written, CONTENT_LEN as u64);
    assert!(std::fs::read(&path).unwrap() == content);
}

#[tokio::test]
async fn test_download_to_file_mismatch_leaves_no_file() {
    let content = test_content(CONTENT_LEN);
    let server = ranged_origin(RangeResponder::new(content), CONTENT_LEN).await;
    let target = DownloadTarget::new(&resource_url(&server)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resource.bin");
    let expected = ExpectedDigest::new(HashAlgorithm::Sha256, WRONG_SHA256).unwrap();

    let error = engine()
        .download_to_file(&target, &path, Some(expected))
        .await
        .unwrap_err();

    assert!(matches!(error, DownloadError::HashMismatch { .. }), "got {error:?}");
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
