use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{AppConfig, ResolvedPaths};

const DEFAULT_CONFIG_FILE: &str = "adminkit.toml";

pub fn load_default() -> Result<AppConfig, ConfigError> {
    let path = std::env::var("ADMINKIT_CONFIG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut cfg = if path.exists() {
        load_from(&path)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("ADMINKIT_CATALOG_URL") {
        if !v.trim().is_empty() {
            cfg.catalog.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("ADMINKIT_CACHE_DIR") {
        if !v.trim().is_empty() {
            cfg.cache.dir = v;
        }
    }
    if let Ok(v) = std::env::var("ADMINKIT_LEDGER_PATH") {
        if !v.trim().is_empty() {
            cfg.ledger.path = v;
        }
    }
}

impl AppConfig {
    pub fn resolve_paths(&self) -> Result<ResolvedPaths, ConfigError> {
        let cache_dir = if self.cache.dir.trim().is_empty() {
            dirs::cache_dir()
                .ok_or(ConfigError::NoDefaultDir("cache"))?
                .join("adminkit")
        } else {
            expand(&self.cache.dir)?
        };

        let ledger_path = if self.ledger.path.trim().is_empty() {
            dirs::data_local_dir()
                .ok_or(ConfigError::NoDefaultDir("data"))?
                .join("adminkit")
                .join("history.ndjson")
        } else {
            expand(&self.ledger.path)?
        };

        let log_dir = match self.logging.directory.as_deref() {
            Some(d) if !d.trim().is_empty() => Some(expand(d)?),
            _ => None,
        };

        Ok(ResolvedPaths {
            cache_dir,
            ledger_path,
            log_dir,
        })
    }
}

fn expand(raw: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(raw)
        .map(|s| PathBuf::from(s.as_ref()))
        .map_err(|e| ConfigError::Expand {
            path: raw.to_string(),
            message: e.to_string(),
        })
}
