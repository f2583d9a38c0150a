use std::{fmt, path::Path, sync::Arc};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{ArtifactStore, DiskStore, ManifestEntry, MemStore, manifest::Manifest},
    common,
    error::FetchError,
};

/// Identity of a cached dataset: what it is and which release of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub id: String,
    pub version: String,
}

impl DatasetKey {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { id: id.into(), version: version.into() }
    }

    /// Stable store address for this key.
    pub fn digest(&self) -> String {
        common::sha256_bytes(format!("{}\n{}", self.id, self.version).as_bytes())
    }

    fn artifact_path(&self) -> String {
        format!("artifacts/{}.bin", self.digest())
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Explicit cache of raw and normalized dataset bytes, keyed by (id, version).
/// Entries live until invalidated; a digest mismatch on read is treated as a miss.
pub struct DatasetCache {
    store: Box<dyn ArtifactStore>,
    manifest: Manifest,
}

impl DatasetCache {
    pub fn new(store: impl ArtifactStore + 'static) -> Self {
        let manifest = Manifest::load(&store);
        Self { store: Box::new(store), manifest }
    }

    pub fn on_disk(dir: &Path) -> Self { Self::new(DiskStore::new(dir)) }

    pub fn in_memory() -> Self { Self::new(MemStore::new()) }

    #[inline] pub fn len(&self) -> usize { self.manifest.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.manifest.entries.is_empty() }

    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.manifest.entries.values()
    }

    pub fn contains(&self, key: &DatasetKey) -> bool {
        self.manifest.entries.contains_key(&key.digest())
    }

    /// Cached bytes for the key, if present and intact.
    pub fn get(&self, key: &DatasetKey) -> Option<Arc<[u8]>> {
        let entry = self.manifest.entries.get(&key.digest())?;
        let bytes = match self.store.get(&key.artifact_path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("[cache] {key}: {e:#}");
                return None
            }
        };

        if common::sha256_bytes(&bytes) != entry.sha256 {
            log::warn!("[cache] {key}: digest mismatch; ignoring cached copy");
            return None
        }

        Some(bytes)
    }

    pub fn put(&mut self, key: &DatasetKey, bytes: &[u8]) -> Result<()> {
        self.store.put(&key.artifact_path(), bytes)?;
        self.manifest.entries.insert(key.digest(), ManifestEntry {
            id: key.id.clone(),
            version: key.version.clone(),
            sha256: common::sha256_bytes(bytes),
            size: bytes.len(),
        });
        self.manifest.save(self.store.as_mut())
    }

    /// Return the cached bytes, or fetch, store and return them.
    /// A failure to write the cache is logged and does not fail the fetch.
    pub fn get_or_fetch(
        &mut self,
        key: &DatasetKey,
        fetch: impl FnOnce() -> Result<Vec<u8>, FetchError>,
    ) -> Result<Arc<[u8]>, FetchError> {
        if let Some(bytes) = self.get(key) {
            log::debug!("[cache] hit {key}");
            return Ok(bytes)
        }
        log::debug!("[cache] miss {key}");
        self.store_fetched(key, fetch()?)
    }

    /// Fetch again and replace the cached copy. On fetch failure the old copy is kept.
    pub fn refresh(
        &mut self,
        key: &DatasetKey,
        fetch: impl FnOnce() -> Result<Vec<u8>, FetchError>,
    ) -> Result<Arc<[u8]>, FetchError> {
        let bytes = fetch()?;
        self.store_fetched(key, bytes)
    }

    fn store_fetched(&mut self, key: &DatasetKey, bytes: Vec<u8>) -> Result<Arc<[u8]>, FetchError> {
        if let Err(e) = self.put(key, &bytes) {
            log::warn!("[cache] {key}: failed to store: {e:#}");
        }
        Ok(Arc::from(bytes))
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &DatasetKey) -> Result<bool> {
        Ok(self.invalidate_where(|entry| entry.id == key.id && entry.version == key.version)? > 0)
    }

    /// Drop every entry matching the predicate. Returns how many were dropped.
    pub fn invalidate_where(&mut self, predicate: impl Fn(&ManifestEntry) -> bool) -> Result<usize> {
        let doomed = self.manifest.entries.iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(digest, _)| digest.clone())
            .collect::<Vec<_>>();

        for digest in &doomed {
            self.store.remove(&format!("artifacts/{digest}.bin"))?;
            if let Some(entry) = self.manifest.entries.remove(digest) {
                log::info!("[cache] invalidated {}@{}", entry.id, entry.version);
            }
        }

        if !doomed.is_empty() {
            self.manifest.save(self.store.as_mut())?;
        }
        Ok(doomed.len())
    }

    /// Drop every entry.
    pub fn clear(&mut self) -> Result<usize> {
        self.invalidate_where(|_| true)
    }
}
