use std::{fs, io::{Cursor, Read}, path::{Path, PathBuf}};

use anyhow::{Context, Result, anyhow, bail};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::{ZipArchive, result::ZipError};

/// Upper bound on the buffer reserved from a zip entry's declared size.
const MAX_ENTRY_PREALLOC: u64 = 64 * 1024 * 1024;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Extracts an in-memory `.zip` archive into the target directory.
pub(crate) fn extract_zip_bytes(bytes: &[u8], dest_dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| anyhow!("failed to read zip archive: {e}"))?;

    archive
        .extract(dest_dir)
        .map_err(|e| anyhow!("failed to extract zip archive to {:?}: {e}", dest_dir))?;

    Ok(())
}

/// Read one file out of an in-memory `.zip` archive.
/// Looks for `name` at the archive root first, then inside any single sub-folder.
/// Returns Ok(None) if the archive has no such file.
pub(crate) fn read_zip_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<Vec<u8>>> {
    let path = if archive.index_for_name(name).is_some() {
        name.to_string()
    } else {
        let suffix = format!("/{name}");
        match archive.file_names().find(|entry| entry.ends_with(&suffix)) {
            Some(entry) => entry.to_string(),
            None => return Ok(None),
        }
    };

    let mut file = match archive.by_name(&path) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(anyhow!("failed to open {path} in zip archive: {e}")),
    };

    let mut bytes = Vec::with_capacity(file.size().min(MAX_ENTRY_PREALLOC) as usize);
    file.read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {path} from zip archive"))?;
    Ok(Some(bytes))
}

/// Find the first file under `dir` (recursively, in sorted order) with the given extension.
pub(crate) fn find_file_with_extension(dir: &Path, ext: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .find(|path| path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
}

/// Lowercase hex SHA-256 digest of a byte slice.
pub(crate) fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
