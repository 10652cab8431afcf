//! Artifact cache behaviour across downloads, restarts and local tampering.
mod common;

use std::sync::Arc;
use std::time::Duration;

use adminkit_core::api::{CacheError, ErrorKind, MemorySource};
use futures::future::join_all;

use common::{open_cache, publish, HOUR};

const KEY: &str = "tools/disk/clean.sh";

#[tokio::test]
async fn first_resolve_downloads_then_hits_never_touch_network() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let sum = publish(&source, KEY, "echo clean");
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let path = cache.resolve(KEY, &sum).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "echo clean");
    assert_eq!(source.fetch_count(KEY), 1);

    for _ in 0..3 {
        assert_eq!(cache.resolve(KEY, &sum).await.unwrap(), path);
    }
    assert_eq!(source.total_fetches(), 1);

    let entry = cache.entry(KEY).unwrap();
    assert!(entry.verified);
    assert_eq!(entry.size_bytes, "echo clean".len() as u64);
    assert_eq!(cache.size(), entry.size_bytes);
}

#[tokio::test]
async fn entries_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let sum = publish(&source, KEY, "echo clean");
    {
        let cache = open_cache(dir.path(), HOUR, &source).await;
        cache.resolve(KEY, &sum).await.unwrap();
    }

    let offline = Arc::new(MemorySource::new());
    offline.set_offline(true);
    let cache = open_cache(dir.path(), HOUR, &offline).await;
    let path = cache.resolve(KEY, &sum).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "echo clean");
    assert_eq!(offline.total_fetches(), 0);
}

#[tokio::test]
async fn tampered_file_is_replaced_on_next_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let sum = publish(&source, KEY, "echo clean");
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let path = cache.resolve(KEY, &sum).await.unwrap();
    std::fs::write(&path, "rm -rf /").unwrap();

    let path = cache.resolve(KEY, &sum).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "echo clean");
    assert_eq!(source.fetch_count(KEY), 2);
}

#[tokio::test]
async fn expired_entries_are_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let sum = publish(&source, KEY, "echo clean");
    let cache = open_cache(dir.path(), Duration::ZERO, &source).await;

    cache.resolve(KEY, &sum).await.unwrap();
    cache.resolve(KEY, &sum).await.unwrap();
    assert_eq!(source.fetch_count(KEY), 2);
}

#[tokio::test]
async fn concurrent_resolves_share_one_download() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::with_latency(Duration::from_millis(150)));
    let sum = publish(&source, KEY, "echo clean");
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let results = join_all((0..8).map(|_| {
        let cache = cache.clone();
        let sum = sum.clone();
        tokio::spawn(async move { cache.resolve(KEY, &sum).await })
    }))
    .await;

    let paths: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(source.fetch_count(KEY), 1);
}

#[tokio::test]
async fn checksum_mismatch_fails_and_caches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    publish(&source, KEY, "echo tampered upstream");
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let expected = adminkit_core::integrity::digest_bytes(b"echo clean");
    let err = cache.resolve(KEY, &expected).await.unwrap_err();
    assert!(matches!(err, CacheError::Integrity { .. }));
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(cache.entry(KEY).is_none());
    assert!(cache.entries().is_empty());
}

#[tokio::test]
async fn new_catalog_checksum_replaces_old_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let v1 = publish(&source, KEY, "echo v1");
    let cache = open_cache(dir.path(), HOUR, &source).await;
    cache.resolve(KEY, &v1).await.unwrap();

    let v2 = publish(&source, KEY, "echo v2");
    let path = cache.resolve(KEY, &v2).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "echo v2");
    assert_eq!(source.fetch_count(KEY), 2);
}

#[tokio::test]
async fn unreachable_remote_without_copy_is_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let sum = publish(&source, KEY, "echo clean");
    source.set_offline(true);
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let err = cache.resolve(KEY, &sum).await.unwrap_err();
    assert!(matches!(err, CacheError::Network { .. }));
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn invalidate_and_clear_remove_entries() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let a = publish(&source, "tools/a.sh", "echo a");
    let b = publish(&source, "tools/b.sh", "echo b");
    let cache = open_cache(dir.path(), HOUR, &source).await;
    cache.resolve("tools/a.sh", &a).await.unwrap();
    let b_path = cache.resolve("tools/b.sh", &b).await.unwrap();

    assert!(cache.invalidate("tools/a.sh").unwrap());
    assert!(!cache.invalidate("tools/a.sh").unwrap());
    assert_eq!(cache.entries().len(), 1);

    assert_eq!(cache.clear().await.unwrap(), 1);
    assert!(!b_path.exists());
    assert_eq!(cache.size(), 0);
}

#[tokio::test]
async fn unsafe_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let cache = open_cache(dir.path(), HOUR, &source).await;

    for key in ["../escape.sh", "/abs.sh", "tools//x.sh", ""] {
        let err = cache.resolve(key, "00").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }), "{key}");
    }
    assert_eq!(source.total_fetches(), 0);
}

#[tokio::test]
async fn key_that_prefixes_another_key_resolves_independently() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let outer = publish(&source, "tools/net", "echo outer");
    let inner = publish(&source, "tools/net/flush.sh", "echo inner");
    let cache = open_cache(dir.path(), HOUR, &source).await;

    let outer_path = cache.resolve("tools/net", &outer).await.unwrap();
    let inner_path = cache.resolve("tools/net/flush.sh", &inner).await.unwrap();
    assert_eq!(std::fs::read_to_string(&outer_path).unwrap(), "echo outer");
    assert_eq!(std::fs::read_to_string(&inner_path).unwrap(), "echo inner");
    assert_eq!(inner_path.file_name().unwrap(), "flush.sh");

    assert!(cache.invalidate("tools/net").unwrap());
    assert!(!outer_path.exists());
    assert_eq!(cache.resolve("tools/net/flush.sh", &inner).await.unwrap(), inner_path);
}
