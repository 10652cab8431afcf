use thiserror::Error;

use super::{CacheError, CatalogError, ConfigError, ExecError, LedgerError, Remediation};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Command(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            CliError::Catalog(e) => e.remediation(),
            CliError::Cache(e) => e.remediation(),
            CliError::Exec(e) => e.remediation(),
            _ => None,
        }
    }
}
