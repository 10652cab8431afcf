//! Periodic maintenance tasks: cache pruning and catalog refresh.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::ArtifactCache;
use crate::catalog::CatalogResolver;

/// Owns the maintenance tasks and their shared shutdown signal.
pub struct Background {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Background {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn spawn_cache_pruner(&mut self, cache: ArtifactCache, every: Duration) {
        let handle = spawn_cache_pruner(cache, every, self.shutdown.subscribe());
        self.tasks.push(handle);
    }

    pub fn spawn_catalog_refresher(&mut self, resolver: Arc<CatalogResolver>, every: Duration) {
        let handle = spawn_catalog_refresher(resolver, every, self.shutdown.subscribe());
        self.tasks.push(handle);
    }

    /// Signals every task and waits for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes expired cache entries every `every`. The first pass runs one
/// interval after start.
pub fn spawn_cache_pruner(
    cache: ArtifactCache,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(periodic("cache-pruner", every, shutdown, move || {
        let cache = cache.clone();
        async move {
            match cache.prune() {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(target: "adminkit.background", removed, "pruned expired cache entries")
                }
                Err(e) => tracing::warn!(target: "adminkit.background", error = %e, "cache prune failed"),
            }
        }
    }))
}

/// Re-resolves the catalog every `every`; a fetch only happens once the
/// cached manifest has expired.
pub fn spawn_catalog_refresher(
    resolver: Arc<CatalogResolver>,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(periodic("catalog-refresher", every, shutdown, move || {
        let resolver = resolver.clone();
        async move {
            if let Err(e) = resolver.resolve(false).await {
                tracing::warn!(target: "adminkit.background", error = %e, "catalog refresh failed");
            }
        }
    }))
}

async fn periodic<F, Fut>(name: &'static str, every: Duration, mut shutdown: watch::Receiver<bool>, mut work: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let every = every.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(target: "adminkit.background", task = name, every_ms = every.as_millis() as u64, "started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => work().await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(target: "adminkit.background", task = name, "stopped");
}
