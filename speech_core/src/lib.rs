mod cache;
mod catalog;
mod fingerprint;

pub use cache::{ResponseCache, DEFAULT_CACHE_CAPACITY};
pub use catalog::{CatalogError, VoiceCatalog};
pub use fingerprint::Fingerprint;
