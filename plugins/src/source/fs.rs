use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use adminkit_core::error::FetchError;
use adminkit_core::source::RemoteSource;
use async_trait::async_trait;
use bytes::Bytes;

/// Catalog mirrored into a local or network-share directory.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, path: &str) -> Result<PathBuf, FetchError> {
        let rel = Path::new(path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl RemoteSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        let file = self.path_for(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(FetchError::Unreachable {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
