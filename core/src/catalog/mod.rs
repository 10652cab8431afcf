//! Remote catalog: manifest format, validation and resolution.

mod manifest;
mod model;
mod resolver;
pub mod version;

pub use manifest::{build_catalog, parse_manifest, Manifest};
pub use model::{Catalog, CatalogOrigin, ModuleRef, ToolDescriptor, UpdateNotice};
pub use resolver::{CatalogResolver, MANIFEST_KEY};
