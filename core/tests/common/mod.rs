#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adminkit_core::api::{ArtifactCache, MemorySource, ModuleRef, ToolDescriptor};
use adminkit_core::integrity::digest_bytes;

pub const HOUR: Duration = Duration::from_secs(3600);

pub async fn open_cache(root: &Path, ttl: Duration, source: &Arc<MemorySource>) -> ArtifactCache {
    ArtifactCache::open(root, ttl, source.clone()).await.unwrap()
}

/// Publishes `content` at `path` and returns its checksum.
pub fn publish(source: &MemorySource, path: &str, content: &str) -> String {
    source.insert(path, content.as_bytes().to_vec());
    digest_bytes(content.as_bytes())
}

pub fn tool(id: &str, artifact_path: &str, checksum: &str) -> ToolDescriptor {
    ToolDescriptor {
        id: id.to_string(),
        name: id.to_uppercase(),
        category: "Test".to_string(),
        version: "1.0.0".to_string(),
        artifact_path: artifact_path.to_string(),
        checksum: checksum.to_string(),
        dependencies: Vec::new(),
        requires_elevated_privilege: false,
        requires_external_resource: false,
        external_resource: None,
    }
}

pub fn module(id: &str, artifact_path: &str, checksum: &str) -> ModuleRef {
    ModuleRef {
        id: id.to_string(),
        artifact_path: artifact_path.to_string(),
        checksum: checksum.to_string(),
    }
}
