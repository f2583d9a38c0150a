use std::{collections::HashMap, fs, io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};

use crate::common;

/// Byte storage addressed by store-relative path, e.g. "artifacts/<sha>.bin", "manifest.json".
pub trait ArtifactStore: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()>;
    /// Remove an artifact; removing a missing artifact is not an error.
    fn remove(&mut self, rel: &str) -> Result<()>;
}

/// Artifacts stored as files under a root directory.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn full(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl ArtifactStore for DiskStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.full(rel);
        Ok(Arc::from(fs::read(&path).with_context(|| format!("[cache] Failed to read {}", path.display()))?))
    }

    fn has(&self, rel: &str) -> bool { self.full(rel).is_file() }

    /// Write through a temp file in the same directory, then rename over the target.
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full(rel);
        let parent = path.parent().ok_or_else(|| anyhow!("[cache] {} has no parent", path.display()))?;
        common::ensure_dir_exists(parent)?;

        let tmp = tempfile::NamedTempFile::new_in(parent).context("[cache] Failed to create temp file")?;
        fs::write(tmp.path(), bytes).with_context(|| format!("[cache] Failed to write {}", path.display()))?;
        tmp.persist(&path).with_context(|| format!("[cache] Failed to rename to {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        match fs::remove_file(self.full(rel)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e).with_context(|| format!("[cache] Failed to remove {rel}")),
            _ => Ok(()),
        }
    }
}

/// Artifacts kept in memory for the lifetime of the store.
#[derive(Default, Clone)]
pub struct MemStore {
    pub(crate) files: HashMap<String, Arc<[u8]>>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }
}

impl ArtifactStore for MemStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("[cache] missing artifact: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }

    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(rel.to_string(), Arc::from(bytes.to_vec()));
        Ok(())
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        self.files.remove(rel);
        Ok(())
    }
}
