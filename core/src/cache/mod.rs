mod entry;
mod layout;
mod store;

pub use entry::CacheEntry;
pub use store::ArtifactCache;

/// Keys under this prefix belong to the cache's own documents (the catalog
/// manifest) and are never valid artifact paths.
pub const RESERVED_PREFIX: &str = "__catalog__/";
