use std::path::PathBuf;
use std::sync::Arc;

use adminkit_core::config::AppConfig;
use adminkit_core::preflight::ReachabilityProbe;
use adminkit_core::source::RemoteSource;
use anyhow::Result;

use crate::probe::TcpProbe;
use crate::source::{DirectorySource, HttpSource};

/// `http(s)://` catalogs are fetched over the network; `file://` URLs and
/// plain paths are read from a mirrored directory.
pub fn build_source(cfg: &AppConfig) -> Result<Arc<dyn RemoteSource>> {
    let base = cfg.catalog.base_url.trim();
    if base.starts_with("http://") || base.starts_with("https://") {
        return Ok(Arc::new(HttpSource::new(base, cfg.catalog.timeout_ms)?));
    }
    let dir = base.strip_prefix("file://").unwrap_or(base);
    Ok(Arc::new(DirectorySource::new(PathBuf::from(dir))))
}

pub fn build_probe(_cfg: &AppConfig) -> Arc<dyn ReachabilityProbe> {
    Arc::new(TcpProbe::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_source() {
        let mut cfg = AppConfig::default();
        cfg.catalog.base_url = "https://catalog.example/tools/".into();
        assert_eq!(build_source(&cfg).unwrap().name(), "http");

        cfg.catalog.base_url = "file:///srv/catalog".into();
        assert_eq!(build_source(&cfg).unwrap().name(), "directory");

        cfg.catalog.base_url = "/mnt/share/catalog".into();
        assert_eq!(build_source(&cfg).unwrap().name(), "directory");
    }
}
