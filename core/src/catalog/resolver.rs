use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use crate::cache::ArtifactCache;
use crate::error::CatalogError;
use crate::source::RemoteSource;

use super::manifest::{build_catalog, parse_manifest};
use super::model::{Catalog, CatalogOrigin, UpdateNotice};

/// Cache key the raw manifest is stored under.
pub const MANIFEST_KEY: &str = "__catalog__/manifest.json";

/// Fetches and validates the remote catalog. Resolutions inside the cache TTL
/// are served from the cached manifest; an unreachable remote falls back to the
/// last cached copy even if it has expired.
pub struct CatalogResolver {
    source: Arc<dyn RemoteSource>,
    cache: ArtifactCache,
    manifest_path: String,
    running_version: String,
    current: RwLock<Option<Arc<Catalog>>>,
    updates: watch::Sender<Option<UpdateNotice>>,
}

impl CatalogResolver {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        cache: ArtifactCache,
        manifest_path: impl Into<String>,
        running_version: impl Into<String>,
    ) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            source,
            cache,
            manifest_path: manifest_path.into(),
            running_version: running_version.into(),
            current: RwLock::new(None),
            updates,
        }
    }

    /// Self-update side channel. Holds the latest notice (or `None` when the
    /// running launcher is current); never gates tool resolution.
    pub fn subscribe_updates(&self) -> watch::Receiver<Option<UpdateNotice>> {
        self.updates.subscribe()
    }

    /// Last successfully resolved catalog, if any.
    pub fn current(&self) -> Option<Arc<Catalog>> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub async fn resolve(&self, force_refresh: bool) -> Result<Arc<Catalog>, CatalogError> {
        if !force_refresh {
            if let Some((_, bytes)) = self.cache.read(MANIFEST_KEY, false).await {
                match self.build(&bytes, CatalogOrigin::Cache) {
                    Ok(catalog) => {
                        tracing::debug!(target: "adminkit.catalog", "catalog served from cache");
                        return Ok(self.publish(catalog));
                    }
                    Err(e) => {
                        tracing::warn!(target: "adminkit.catalog", error = %e, "cached manifest rejected, refetching");
                        self.cache.invalidate(MANIFEST_KEY)?;
                    }
                }
            }
        }

        match self.source.fetch(&self.manifest_path).await {
            Ok(bytes) => {
                let catalog = self.build(&bytes, CatalogOrigin::Remote)?;
                if let Err(e) = self.cache.store(MANIFEST_KEY, &bytes).await {
                    tracing::warn!(target: "adminkit.catalog", error = %e, "failed to cache manifest");
                }
                tracing::info!(
                    target: "adminkit.catalog",
                    source = self.source.name(),
                    tools = catalog.tools.len(),
                    launcher_version = %catalog.launcher_version,
                    "catalog fetched"
                );
                Ok(self.publish(catalog))
            }
            Err(e) if e.is_transient() => {
                let Some((entry, bytes)) = self.cache.read(MANIFEST_KEY, true).await else {
                    return Err(CatalogError::Network(e));
                };
                tracing::warn!(
                    target: "adminkit.catalog",
                    error = %e,
                    cached_at = %entry.downloaded_at,
                    "catalog unreachable, serving cached manifest"
                );
                let catalog = self.build(&bytes, CatalogOrigin::StaleCache)?;
                Ok(self.publish(catalog))
            }
            Err(e) => Err(CatalogError::Network(e)),
        }
    }

    /// Drops the cached manifest so it can no longer serve as a fallback.
    pub fn invalidate_cached_manifest(&self) -> Result<bool, CatalogError> {
        Ok(self.cache.invalidate(MANIFEST_KEY)?)
    }

    fn build(&self, bytes: &[u8], origin: CatalogOrigin) -> Result<Catalog, CatalogError> {
        let manifest = parse_manifest(bytes)?;
        build_catalog(manifest, &self.running_version, origin)
    }

    fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        if let Some(notice) = &catalog.update {
            tracing::info!(
                target: "adminkit.catalog",
                current = %notice.current,
                available = %notice.available,
                "launcher update available"
            );
        }
        self.updates.send_replace(catalog.update.clone());

        let catalog = Arc::new(catalog);
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(catalog.clone());
        catalog
    }
}
