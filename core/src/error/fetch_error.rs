use thiserror::Error;

use super::{ErrorKind, Remediation};

/// Failure reported by a [`RemoteSource`](crate::source::RemoteSource).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("remote unreachable while fetching {path}: {message}")]
    Unreachable { path: String, message: String },

    #[error("remote returned status {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("remote has no artifact at {path}")]
    NotFound { path: String },

    #[error("invalid remote path: {0}")]
    InvalidPath(String),
}

impl FetchError {
    /// Transient failures are the ones worth retrying or papering over with a
    /// stale cache copy.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Unreachable { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::NotFound { .. } | FetchError::InvalidPath(_) => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidPath(_) => ErrorKind::Invalid,
            _ => ErrorKind::Network,
        }
    }

    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            FetchError::Unreachable { .. } | FetchError::Status { .. } => {
                Some(Remediation::CheckConnectivity)
            }
            FetchError::NotFound { .. } | FetchError::InvalidPath(_) => None,
        }
    }
}
