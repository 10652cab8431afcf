use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::CacheError;
use crate::integrity::digest_bytes;

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const TMP_DIR: &str = "tmp";

/// On-disk layout of the cache root:
///
/// ```text
/// <root>/objects/<sha256(key)>/<file name>   artifact bytes
/// <root>/meta/<sha256(key)>.json             CacheEntry sidecar
/// <root>/tmp/<uuid>.part                     in-progress downloads
/// ```
#[derive(Debug, Clone)]
pub(crate) struct CacheLayout {
    root: PathBuf,
    objects: PathBuf,
    meta: PathBuf,
    tmp: PathBuf,
}

impl CacheLayout {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            objects: root.join(OBJECTS_DIR),
            meta: root.join(META_DIR),
            tmp: root.join(TMP_DIR),
            root,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn objects_dir(&self) -> &Path {
        &self.objects
    }

    pub(crate) fn meta_dir(&self) -> &Path {
        &self.meta
    }

    pub(crate) fn tmp_dir(&self) -> &Path {
        &self.tmp
    }

    /// Each key gets its own directory, so one key being a path prefix of
    /// another never clashes. The file name is kept for interpreters that
    /// care about extensions.
    pub(crate) fn object_path(&self, key: &str) -> PathBuf {
        let name = key.rsplit('/').next().unwrap_or(key);
        self.objects.join(digest_bytes(key.as_bytes())).join(name)
    }

    pub(crate) fn meta_path(&self, key: &str) -> PathBuf {
        self.meta
            .join(format!("{}.json", digest_bytes(key.as_bytes())))
    }

    pub(crate) fn tmp_path(&self) -> PathBuf {
        self.tmp.join(format!("{}.part", Uuid::new_v4()))
    }
}

/// Cache keys are catalog-relative `/`-separated paths. Anything that could
/// escape the objects directory is refused.
pub(crate) fn validate_key(key: &str) -> Result<(), CacheError> {
    let invalid = |reason: &'static str| CacheError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("absolute path"));
    }
    if key.contains('\\') || key.contains(':') || key.contains('\0') {
        return Err(invalid("contains a forbidden character"));
    }
    for part in key.split('/') {
        match part {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
