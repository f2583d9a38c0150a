use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::ArtifactStore;

pub(crate) const MANIFEST: &str = "manifest.json";

const FORMAT_VERSION: &str = "1";

/// One cached artifact: the key it was stored under and the digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub version: String,
    pub sha256: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Manifest {
    version: String,
    /// key digest → entry
    pub(crate) entries: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: FORMAT_VERSION.into(), entries: BTreeMap::new() }
    }
}

impl Manifest {
    /// Read the manifest from a store. A missing manifest is an empty cache;
    /// an unreadable one is discarded with a warning.
    pub(crate) fn load(store: &dyn ArtifactStore) -> Self {
        if !store.has(MANIFEST) { return Self::default() }

        let parsed = store.get(MANIFEST)
            .and_then(|bytes| serde_json::from_slice::<Manifest>(&bytes).context("Failed to parse manifest.json"));

        match parsed {
            Ok(manifest) if manifest.version == FORMAT_VERSION => manifest,
            Ok(manifest) => {
                log::warn!("[cache] manifest format {} is not supported; starting empty", manifest.version);
                Self::default()
            }
            Err(e) => {
                log::warn!("[cache] {e:#}; starting empty");
                Self::default()
            }
        }
    }

    pub(crate) fn save(&self, store: &mut dyn ArtifactStore) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("[cache] Failed to serialize manifest.json")?;
        store.put(MANIFEST, &bytes)
    }
}
