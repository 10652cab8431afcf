use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::io::AsyncWriteExt;

use crate::error::CacheError;
use crate::integrity::{self, Verification};
use crate::source::RemoteSource;

use super::entry::CacheEntry;
use super::layout::{validate_key, CacheLayout};

type DownloadFuture = Shared<BoxFuture<'static, Result<PathBuf, CacheError>>>;

struct Inflight {
    checksum: String,
    fut: DownloadFuture,
}

enum Step {
    Verify(CacheEntry),
    Join { checksum: String, fut: DownloadFuture },
}

/// Durable local store of downloaded artifacts.
///
/// Cloning is cheap; all clones share one index and one in-flight table. The
/// cache is the only writer of its root directory.
#[derive(Clone)]
pub struct ArtifactCache {
    inner: Arc<Inner>,
}

struct Inner {
    layout: CacheLayout,
    ttl: chrono::Duration,
    source: Arc<dyn RemoteSource>,
    index: RwLock<HashMap<String, CacheEntry>>,
    // Lock order: inflight, then index.
    inflight: Mutex<HashMap<String, Inflight>>,
}

impl ArtifactCache {
    /// Opens (or creates) a cache rooted at `root`, loading every sidecar
    /// record left by a previous process.
    pub async fn open(
        root: impl Into<PathBuf>,
        ttl: Duration,
        source: Arc<dyn RemoteSource>,
    ) -> Result<Self, CacheError> {
        let layout = CacheLayout::new(root);
        for dir in [layout.objects_dir(), layout.meta_dir(), layout.tmp_dir()] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CacheError::io(dir, e))?;
        }

        // Leftover temp files belong to downloads that never finished.
        remove_dir_contents(layout.tmp_dir()).await?;

        let index = load_index(&layout).await?;
        tracing::info!(
            target: "adminkit.cache",
            root = %layout.root().display(),
            entries = index.len(),
            "artifact cache opened"
        );

        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Ok(Self {
            inner: Arc::new(Inner {
                layout,
                ttl,
                source,
                index: RwLock::new(index),
                inflight: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        self.inner.layout.root()
    }

    /// Returns a local path whose content hashes to `expected`, downloading
    /// when there is no unexpired verified entry. Concurrent calls for the same
    /// key share one download.
    pub async fn resolve(&self, key: &str, expected: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        let expected = integrity::normalize_checksum(expected);

        loop {
            match self.next_step(key, &expected) {
                Step::Verify(entry) => match integrity::check(&entry.local_path, &expected).await {
                    Verification::Match => {
                        tracing::debug!(target: "adminkit.cache", key, "cache hit");
                        return Ok(entry.local_path);
                    }
                    other => {
                        tracing::warn!(
                            target: "adminkit.cache",
                            key,
                            verification = ?other,
                            "cached artifact failed verification, evicting"
                        );
                        self.inner.evict_if_current(key, &entry)?;
                    }
                },
                Step::Join { checksum, fut } => {
                    let result = fut.await;
                    if checksum == expected {
                        return result;
                    }
                    // Joined a download for another checksum; re-evaluate.
                }
            }
        }
    }

    fn next_step(&self, key: &str, expected: &str) -> Step {
        let mut inflight = lock(&self.inner.inflight);
        if let Some(running) = inflight.get(key) {
            tracing::debug!(target: "adminkit.cache", key, "joining in-flight download");
            return Step::Join {
                checksum: running.checksum.clone(),
                fut: running.fut.clone(),
            };
        }

        let now = Utc::now();
        let fresh = rlock(&self.inner.index)
            .get(key)
            .filter(|e| {
                !e.is_expired(now) && e.verified && integrity::checksums_match(&e.checksum, expected)
            })
            .cloned();
        if let Some(entry) = fresh {
            return Step::Verify(entry);
        }

        let fut = self.spawn_download(key, expected);
        inflight.insert(
            key.to_string(),
            Inflight {
                checksum: expected.to_string(),
                fut: fut.clone(),
            },
        );
        Step::Join {
            checksum: expected.to_string(),
            fut,
        }
    }

    fn spawn_download(&self, key: &str, expected: &str) -> DownloadFuture {
        let inner = self.inner.clone();
        let owned_key = key.to_string();
        let expected = expected.to_string();

        // Spawned so the download finishes and updates the index even if every
        // waiter goes away.
        let handle = tokio::spawn(async move {
            let result = inner.download(&owned_key, &expected).await;
            inner.finish_download(&owned_key, result)
        });

        let key = key.to_string();
        async move {
            handle
                .await
                .unwrap_or_else(|_| Err(CacheError::Aborted { key }))
        }
        .boxed()
        .shared()
    }

    /// Writes `bytes` under `key` without an expected checksum; the digest is
    /// computed here. Used for documents the cache owns, like the catalog
    /// manifest.
    pub async fn store(&self, key: &str, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        validate_key(key)?;
        let checksum = integrity::digest_bytes(bytes);
        let tmp = self.inner.write_temp(bytes).await?;
        let entry = self.inner.commit(key, &tmp, &checksum, bytes.len() as u64).await?;

        let _inflight = lock(&self.inner.inflight);
        wlock(&self.inner.index).insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    /// Looks up an entry without touching the network. Expired entries are
    /// only returned with `allow_expired`. An entry whose file no longer
    /// matches its checksum is evicted and reported as absent.
    pub async fn lookup(&self, key: &str, allow_expired: bool) -> Option<CacheEntry> {
        let entry = rlock(&self.inner.index).get(key).cloned()?;
        if !allow_expired && entry.is_expired(Utc::now()) {
            return None;
        }
        if !entry.verified || !integrity::verify(&entry.local_path, &entry.checksum).await {
            tracing::warn!(target: "adminkit.cache", key, "stored document failed verification");
            if let Err(e) = self.inner.evict_if_current(key, &entry) {
                tracing::warn!(target: "adminkit.cache", key, error = %e, "eviction failed");
            }
            return None;
        }
        Some(entry)
    }

    /// [`lookup`](Self::lookup) plus the file content.
    pub async fn read(&self, key: &str, allow_expired: bool) -> Option<(CacheEntry, Vec<u8>)> {
        let entry = self.lookup(key, allow_expired).await?;
        match tokio::fs::read(&entry.local_path).await {
            Ok(bytes) => Some((entry, bytes)),
            Err(e) => {
                tracing::warn!(target: "adminkit.cache", key, error = %e, "cached document unreadable");
                None
            }
        }
    }

    /// Drops the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let _inflight = lock(&self.inner.inflight);
        let removed = wlock(&self.inner.index).remove(key);
        match removed {
            Some(entry) => {
                self.inner.remove_files(&entry)?;
                tracing::info!(target: "adminkit.cache", key, "cache entry invalidated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every entry and its backing file. Returns the number removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let removed = {
            let _inflight = lock(&self.inner.inflight);
            let mut index = wlock(&self.inner.index);
            let n = index.len();
            index.clear();
            n
        };
        remove_dir_contents(self.inner.layout.objects_dir()).await?;
        remove_dir_contents(self.inner.layout.meta_dir()).await?;
        tracing::info!(target: "adminkit.cache", removed, "cache cleared");
        Ok(removed)
    }

    /// Sum of all entry sizes in bytes.
    pub fn size(&self) -> u64 {
        rlock(&self.inner.index).values().map(|e| e.size_bytes).sum()
    }

    /// Removes expired entries. Nothing is re-downloaded until the next
    /// `resolve` asks for it.
    pub fn prune(&self) -> Result<usize, CacheError> {
        let now = Utc::now();
        let _inflight = lock(&self.inner.inflight);
        let expired: Vec<CacheEntry> = {
            let mut index = wlock(&self.inner.index);
            let keys: Vec<String> = index
                .values()
                .filter(|e| e.is_expired(now))
                .map(|e| e.key.clone())
                .collect();
            keys.iter().filter_map(|k| index.remove(k)).collect()
        };
        for entry in &expired {
            self.inner.remove_files(entry)?;
        }
        if !expired.is_empty() {
            tracing::info!(target: "adminkit.cache", pruned = expired.len(), "expired entries pruned");
        }
        Ok(expired.len())
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = rlock(&self.inner.index).values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        rlock(&self.inner.index).get(key).cloned()
    }
}

impl Inner {
    async fn download(&self, key: &str, expected: &str) -> Result<CacheEntry, CacheError> {
        tracing::info!(
            target: "adminkit.cache",
            key,
            source = self.source.name(),
            "downloading artifact"
        );
        let bytes = self
            .source
            .fetch(key)
            .await
            .map_err(|source| CacheError::Network {
                key: key.to_string(),
                source,
            })?;

        let tmp = self.write_temp(&bytes).await?;
        let actual = match integrity::check(&tmp, expected).await {
            Verification::Match => expected.to_string(),
            Verification::Mismatch { actual } => {
                discard(&tmp).await;
                return Err(CacheError::Integrity {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            Verification::Unreadable { message } => {
                discard(&tmp).await;
                return Err(CacheError::Integrity {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    actual: format!("unreadable ({message})"),
                });
            }
        };

        self.commit(key, &tmp, &actual, bytes.len() as u64).await
    }

    async fn write_temp(&self, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let tmp = self.layout.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            discard(&tmp).await;
            return Err(CacheError::io(&tmp, e));
        }
        Ok(tmp)
    }

    /// Moves a verified temp file into place and persists its sidecar. Readers
    /// only ever see the old file or the complete new one.
    async fn commit(
        &self,
        key: &str,
        tmp: &Path,
        checksum: &str,
        size_bytes: u64,
    ) -> Result<CacheEntry, CacheError> {
        let dest = self.layout.object_path(key);
        if let Some(parent) = dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                discard(tmp).await;
                return Err(CacheError::io(parent, e));
            }
        }
        if let Err(e) = tokio::fs::rename(tmp, &dest).await {
            discard(tmp).await;
            return Err(CacheError::io(&dest, e));
        }

        let downloaded_at = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            local_path: dest,
            downloaded_at,
            expires_at: downloaded_at
                .checked_add_signed(self.ttl)
                .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC),
            size_bytes,
            checksum: checksum.to_string(),
            verified: true,
        };
        self.write_sidecar(&entry).await?;
        Ok(entry)
    }

    async fn write_sidecar(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.layout.meta_path(&entry.key);
        let json = serde_json::to_vec_pretty(entry).map_err(|e| CacheError::Metadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let tmp = self.write_temp(&json).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            CacheError::io(&path, e)
        })
    }

    fn finish_download(
        &self,
        key: &str,
        result: Result<CacheEntry, CacheError>,
    ) -> Result<PathBuf, CacheError> {
        let mut inflight = lock(&self.inflight);
        let outcome = match result {
            Ok(entry) => {
                tracing::info!(
                    target: "adminkit.cache",
                    key,
                    size_bytes = entry.size_bytes,
                    "artifact cached"
                );
                let path = entry.local_path.clone();
                wlock(&self.index).insert(key.to_string(), entry);
                Ok(path)
            }
            Err(e) => {
                if let CacheError::Integrity { .. } = e {
                    // Never leave the old entry around to be served again.
                    if let Some(stale) = wlock(&self.index).remove(key) {
                        if let Err(rm) = self.remove_files(&stale) {
                            tracing::warn!(target: "adminkit.cache", key, error = %rm, "failed to remove stale entry");
                        }
                    }
                }
                tracing::warn!(target: "adminkit.cache", key, error = %e, "artifact download failed");
                Err(e)
            }
        };
        inflight.remove(key);
        outcome
    }

    fn evict_if_current(&self, key: &str, seen: &CacheEntry) -> Result<(), CacheError> {
        let _inflight = lock(&self.inflight);
        let mut index = wlock(&self.index);
        if index.get(key) == Some(seen) {
            index.remove(key);
            drop(index);
            self.remove_files(seen)?;
        }
        Ok(())
    }

    fn remove_files(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        for path in [entry.local_path.clone(), self.layout.meta_path(&entry.key)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(path, e)),
            }
        }
        // The per-key object directory; fails harmlessly if something else
        // was staged into it meanwhile.
        if let Some(dir) = entry.local_path.parent() {
            let _ = std::fs::remove_dir(dir);
        }
        Ok(())
    }
}

async fn load_index(layout: &CacheLayout) -> Result<HashMap<String, CacheEntry>, CacheError> {
    let mut index = HashMap::new();
    let mut dir = tokio::fs::read_dir(layout.meta_dir())
        .await
        .map_err(|e| CacheError::io(layout.meta_dir(), e))?;

    while let Some(item) = dir
        .next_entry()
        .await
        .map_err(|e| CacheError::io(layout.meta_dir(), e))?
    {
        let path = item.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = tokio::fs::read(&path)
            .await
            .ok()
            .and_then(|raw| serde_json::from_slice::<CacheEntry>(&raw).ok());
        let Some(mut entry) = parsed else {
            tracing::warn!(target: "adminkit.cache", path = %path.display(), "dropping unreadable sidecar");
            discard(&path).await;
            continue;
        };
        if validate_key(&entry.key).is_err() {
            discard(&path).await;
            continue;
        }
        entry.local_path = layout.object_path(&entry.key);
        if !tokio::fs::try_exists(&entry.local_path).await.unwrap_or(false) {
            discard(&path).await;
            continue;
        }
        index.insert(entry.key.clone(), entry);
    }
    Ok(index)
}

async fn remove_dir_contents(dir: &Path) -> Result<(), CacheError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CacheError::io(dir, e))?;
    while let Some(item) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::io(dir, e))?
    {
        let path = item.path();
        let is_dir = item.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        let removed = if is_dir {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| CacheError::io(&path, e))?;
    }
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(target: "adminkit.cache", path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn rlock<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wlock<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
