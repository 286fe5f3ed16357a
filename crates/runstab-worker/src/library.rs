//! Saving finished videos to the operator's album.

use async_trait::async_trait;
use runstab_media::fs_utils::copy_file_atomic;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::LibraryError;

/// Persistence collaborator, used once after a successful run.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Store a finished file and return its identifier in the library.
    async fn store(&self, finished: &Path) -> Result<String, LibraryError>;
}

/// Library backed by a plain directory.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First free name for `file_name`, adding `-1`, `-2`, ... before the
    /// extension as needed.
    fn free_name(&self, file_name: &Path) -> String {
        let stem = file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let ext = file_name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = format!("{}{}", stem, ext);
        let mut n = 1;
        while self.root.join(&candidate).exists() {
            candidate = format!("{}-{}{}", stem, n, ext);
            n += 1;
        }
        candidate
    }
}

#[async_trait]
impl MediaLibrary for DirectoryLibrary {
    async fn store(&self, finished: &Path) -> Result<String, LibraryError> {
        let file_name = finished
            .file_name()
            .map(Path::new)
            .ok_or_else(|| LibraryError::Unavailable(finished.to_path_buf()))?;

        if self.root.exists() && !self.root.is_dir() {
            return Err(LibraryError::Unavailable(self.root.clone()));
        }

        let name = self.free_name(file_name);
        let destination = self.root.join(&name);

        copy_file_atomic(finished, &destination)
            .await
            .map_err(|source| LibraryError::SaveFailed {
                path: finished.to_path_buf(),
                source,
            })?;

        info!(
            file = %finished.display(),
            library = %self.root.display(),
            stored_as = %name,
            "Saved to library"
        );
        Ok(name)
    }
}
