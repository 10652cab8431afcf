use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

/// Where catalog manifests and artifacts come from. `path` is the logical
/// catalog path (`tools/net/flush-dns.ps1`), never a local filesystem path.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError>;
}

/// In-process source holding documents in memory. Counts fetches per path and
/// can be switched offline, which makes it the usual stand-in for the remote
/// catalog in tests and embedded setups.
#[derive(Default)]
pub struct MemorySource {
    docs: Mutex<HashMap<String, Bytes>>,
    fetches: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every fetch, so concurrent callers overlap.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn insert(&self, path: &str, content: impl Into<Bytes>) {
        self.docs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(path.to_string(), content.into());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(path.to_string())
            .or_default() += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable {
                path: path.to_string(),
                message: "source is offline".to_string(),
            });
        }

        self.docs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
            })
    }
}
