use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shared module that must be cache-resolved before a tool can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRef {
    pub id: String,
    pub artifact_path: String,
    pub checksum: String,
}

/// One runnable tool. Immutable once fetched; a catalog refresh replaces every
/// descriptor at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub version: String,
    pub artifact_path: String,
    pub checksum: String,
    /// Transitive module closure, dependencies before dependents.
    pub dependencies: Vec<ModuleRef>,
    pub requires_elevated_privilege: bool,
    pub requires_external_resource: bool,
    /// `host:port` or URL probed when `requires_external_resource` is set.
    pub external_resource: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    /// Fetched from the remote during this resolution.
    Remote,
    /// Served from an unexpired cached manifest.
    Cache,
    /// Remote unreachable; served from an expired cached manifest.
    StaleCache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotice {
    pub current: String,
    pub available: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub launcher_version: String,
    pub categories: Vec<String>,
    pub tools: Vec<ToolDescriptor>,
    pub modules: Vec<ModuleRef>,
    pub origin: CatalogOrigin,
    pub fetched_at: DateTime<Utc>,
    pub update: Option<UpdateNotice>,
}

impl Catalog {
    pub fn tool(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn tools_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a ToolDescriptor> + 'a {
        self.tools.iter().filter(move |t| t.category == category)
    }
}
