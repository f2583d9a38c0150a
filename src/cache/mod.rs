//! Explicit dataset cache over a pluggable artifact store.

mod dataset;
mod manifest;
mod store;

pub use dataset::{DatasetCache, DatasetKey};
pub use manifest::ManifestEntry;
pub use store::{ArtifactStore, DiskStore, MemStore};
