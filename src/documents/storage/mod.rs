#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{DocQaError, Result};

/// On-disk storage for uploaded document files under a single root directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            DocQaError::Config(format!(
                "Failed to create documents directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write bytes under the given filename, appending `_1`, `_2`, ... before
    /// the extension until a free name is found. Returns the path written and
    /// the final filename.
    #[inline]
    pub fn save_bytes(&self, filename: &str, bytes: &[u8]) -> Result<(PathBuf, String)> {
        let (path, final_name) = self.next_free_path(filename);
        std::fs::write(&path, bytes)?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok((path, final_name))
    }

    #[inline]
    pub fn save_text(&self, filename: &str, content: &str) -> Result<(PathBuf, String)> {
        self.save_bytes(filename, content.as_bytes())
    }

    /// Remove a stored file; an already-absent file counts as removed work
    /// that is simply done, reported as `false`
    #[inline]
    pub fn delete(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    #[inline]
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn next_free_path(&self, filename: &str) -> (PathBuf, String) {
        let candidate = self.root.join(filename);
        if !candidate.exists() {
            return (candidate, filename.to_string());
        }

        let name = Path::new(filename);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

        let mut counter = 1usize;
        loop {
            let next_name = match &extension {
                Some(ext) => format!("{}_{}.{}", stem, counter, ext),
                None => format!("{}_{}", stem, counter),
            };
            let next_path = self.root.join(&next_name);
            if !next_path.exists() {
                return (next_path, next_name);
            }
            counter += 1;
        }
    }
}
