use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;

use crate::cache::RESERVED_PREFIX;
use crate::error::CatalogError;

use super::model::{Catalog, CatalogOrigin, ModuleRef, ToolDescriptor, UpdateNotice};
use super::version::{is_newer, parse_version};

/// Wire form of the remote catalog document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub launcher_version: String,
    #[serde(default)]
    pub categories: Vec<ManifestCategory>,
    #[serde(default)]
    pub modules: Vec<ManifestModule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestCategory {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<ManifestTool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTool {
    pub id: String,
    pub name: String,
    pub version: String,
    pub artifact_path: String,
    pub checksum: String,
    /// Module ids.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub requires_elevated_privilege: bool,
    #[serde(default)]
    pub requires_external_resource: bool,
    #[serde(default)]
    pub external_resource: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestModule {
    pub id: String,
    pub artifact_path: String,
    pub checksum: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, CatalogError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Validates the manifest and expands every tool's module references into a
/// dependency-ordered closure.
pub fn build_catalog(
    manifest: Manifest,
    running_version: &str,
    origin: CatalogOrigin,
) -> Result<Catalog, CatalogError> {
    let modules: HashMap<&str, &ManifestModule> =
        manifest.modules.iter().map(|m| (m.id.as_str(), m)).collect();

    for m in &manifest.modules {
        check_path(&m.artifact_path)?;
    }

    let mut seen_ids = HashSet::new();
    let mut categories = Vec::with_capacity(manifest.categories.len());
    let mut tools = Vec::new();

    for category in &manifest.categories {
        if !categories.contains(&category.name) {
            categories.push(category.name.clone());
        }
        for tool in &category.tools {
            if !seen_ids.insert(tool.id.as_str()) {
                return Err(CatalogError::DuplicateTool(tool.id.clone()));
            }
            check_path(&tool.artifact_path)?;
            if parse_version(&tool.version).is_none() {
                return Err(CatalogError::InvalidVersion {
                    tool: tool.id.clone(),
                    version: tool.version.clone(),
                });
            }

            let dependencies = expand_dependencies(&tool.id, &tool.dependencies, &modules)?;
            tools.push(ToolDescriptor {
                id: tool.id.clone(),
                name: tool.name.clone(),
                category: category.name.clone(),
                version: tool.version.clone(),
                artifact_path: tool.artifact_path.clone(),
                checksum: tool.checksum.clone(),
                dependencies,
                requires_elevated_privilege: tool.requires_elevated_privilege,
                requires_external_resource: tool.requires_external_resource,
                external_resource: tool.external_resource.clone(),
            });
        }
    }

    let update = is_newer(&manifest.launcher_version, running_version).then(|| UpdateNotice {
        current: running_version.to_string(),
        available: manifest.launcher_version.clone(),
    });

    Ok(Catalog {
        launcher_version: manifest.launcher_version.clone(),
        categories,
        tools,
        modules: manifest
            .modules
            .iter()
            .map(|m| ModuleRef {
                id: m.id.clone(),
                artifact_path: m.artifact_path.clone(),
                checksum: m.checksum.clone(),
            })
            .collect(),
        origin,
        fetched_at: Utc::now(),
        update,
    })
}

fn check_path(path: &str) -> Result<(), CatalogError> {
    if path.starts_with(RESERVED_PREFIX) {
        return Err(CatalogError::ReservedPath(path.to_string()));
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn expand_dependencies(
    tool_id: &str,
    roots: &[String],
    modules: &HashMap<&str, &ManifestModule>,
) -> Result<Vec<ModuleRef>, CatalogError> {
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut ordered = Vec::new();
    for root in roots {
        visit(tool_id, root, modules, &mut marks, &mut ordered)?;
    }
    Ok(ordered)
}

fn visit(
    tool_id: &str,
    module_id: &str,
    modules: &HashMap<&str, &ManifestModule>,
    marks: &mut HashMap<String, Mark>,
    ordered: &mut Vec<ModuleRef>,
) -> Result<(), CatalogError> {
    match marks.get(module_id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(CatalogError::DependencyCycle(module_id.to_string())),
        None => {}
    }

    let module = modules
        .get(module_id)
        .ok_or_else(|| CatalogError::UnknownModule {
            tool: tool_id.to_string(),
            module: module_id.to_string(),
        })?;

    marks.insert(module_id.to_string(), Mark::Visiting);
    for dep in &module.requires {
        visit(tool_id, dep, modules, marks, ordered)?;
    }
    marks.insert(module_id.to_string(), Mark::Done);

    ordered.push(ModuleRef {
        id: module.id.clone(),
        artifact_path: module.artifact_path.clone(),
        checksum: module.checksum.clone(),
    });
    Ok(())
}
