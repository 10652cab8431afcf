use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::{ErrorKind, FetchError, Remediation};

// Clone so one single-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("network error resolving {key}: {source}")]
    Network {
        key: String,
        #[source]
        source: FetchError,
    },

    #[error("checksum mismatch for {key}: expected {expected}, got {actual}")]
    Integrity {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("invalid cache key {key}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("corrupt cache metadata at {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("download task for {key} aborted")]
    Aborted { key: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Network { .. } => ErrorKind::Network,
            CacheError::Integrity { .. } => ErrorKind::Integrity,
            CacheError::Io { .. } | CacheError::Metadata { .. } | CacheError::Aborted { .. } => {
                ErrorKind::Io
            }
            CacheError::InvalidKey { .. } => ErrorKind::Invalid,
        }
    }

    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            CacheError::Network { source, .. } => source.remediation(),
            CacheError::Integrity { .. } | CacheError::Metadata { .. } => {
                Some(Remediation::Redownload)
            }
            CacheError::Aborted { .. } => Some(Remediation::Redownload),
            CacheError::Io { .. } | CacheError::InvalidKey { .. } => None,
        }
    }
}
