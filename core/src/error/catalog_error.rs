use thiserror::Error;

use super::{CacheError, ErrorKind, FetchError, Remediation};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unreachable and no cached manifest available: {0}")]
    Network(#[source] FetchError),

    #[error("catalog manifest is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tool {tool} depends on unknown module {module}")]
    UnknownModule { tool: String, module: String },

    #[error("module dependency cycle through {0}")]
    DependencyCycle(String),

    #[error("duplicate tool id {0}")]
    DuplicateTool(String),

    #[error("artifact path {0} uses a reserved prefix")]
    ReservedPath(String),

    #[error("tool {tool} has an invalid version {version}")]
    InvalidVersion { tool: String, version: String },

    #[error("catalog cache error: {0}")]
    Cache(#[from] CacheError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Network(_) => ErrorKind::Network,
            CatalogError::Cache(e) => e.kind(),
            _ => ErrorKind::Invalid,
        }
    }

    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            CatalogError::Network(_) => Some(Remediation::CheckConnectivity),
            CatalogError::Cache(e) => e.remediation(),
            _ => None,
        }
    }
}
