use std::sync::Arc;
use std::time::Duration;

use adminkit_core::api::{
    AppConfig, ArtifactCache, CatalogResolver, ExecutionHost, ExecutionLedger, HostIdentity, NdjsonLedger,
    PreflightValidator, ProcessPrivilege, ResolvedPaths,
};
use adminkit_plugins::factory::{build_probe, build_source};
use anyhow::{Context, Result};

/// Every long-lived component, wired from one config.
pub struct App {
    pub cfg: AppConfig,
    pub cache: ArtifactCache,
    pub resolver: Arc<CatalogResolver>,
    pub validator: PreflightValidator,
    pub host: ExecutionHost,
    pub ledger: Arc<dyn ExecutionLedger>,
}

impl App {
    pub async fn build(cfg: AppConfig, paths: ResolvedPaths) -> Result<Self> {
        let source = build_source(&cfg).context("failed to configure catalog source")?;

        let ttl = Duration::from_secs(cfg.cache.ttl_minutes.saturating_mul(60));
        let cache = ArtifactCache::open(&paths.cache_dir, ttl, source.clone())
            .await
            .with_context(|| format!("failed to open cache at {}", paths.cache_dir.display()))?;

        let resolver = Arc::new(CatalogResolver::new(
            source,
            cache.clone(),
            cfg.catalog.manifest_path.clone(),
            env!("CARGO_PKG_VERSION"),
        ));

        let validator = PreflightValidator::new(
            cache.clone(),
            cfg.interpreter.program.clone(),
            Arc::new(ProcessPrivilege),
            build_probe(&cfg),
        )
        .with_probe_timeout(Duration::from_millis(cfg.preflight.probe_timeout_ms))
        .with_default_probe_target(cfg.preflight.default_probe_target.clone());

        let ledger: Arc<dyn ExecutionLedger> = Arc::new(NdjsonLedger::new(&paths.ledger_path));
        let host = ExecutionHost::new(
            cache.clone(),
            ledger.clone(),
            cfg.interpreter.clone(),
            cfg.control.clone(),
            HostIdentity::detect(),
        );

        tracing::debug!(
            cache_dir = %paths.cache_dir.display(),
            ledger = %paths.ledger_path.display(),
            catalog = %cfg.catalog.base_url,
            "launcher wired"
        );

        Ok(Self {
            cfg,
            cache,
            resolver,
            validator,
            host,
            ledger,
        })
    }
}
