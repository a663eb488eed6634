//! Two-tier file cache
//!
//! Every artifact lives at two paths: the durable cache directory and the
//! live target directory. Either side can be wiped and rebuilt from the
//! other. All state tracked here is byte length; content hashing is out of
//! scope for this pipeline.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::sync::error::{FileOperation, Result, SyncError};

/// Byte lengths observed for one filename at both tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProbe {
    pub cache: Option<u64>,
    pub target: Option<u64>,
}

/// Length-tracking store over the cache and target directories
pub struct CacheStore {
    cache_dir: PathBuf,
    target_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl AsRef<Path>, target_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            target_dir: target_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_path(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn target_path(&self, filename: &str) -> PathBuf {
        self.target_dir.join(filename)
    }

    /// Observe the on-disk lengths at both tiers
    ///
    /// Unreadable files degrade to a miss rather than an error; a stale or
    /// corrupt cache entry is indistinguishable from an absent one for
    /// scheduling purposes.
    pub async fn probe(&self, filename: &str) -> FileProbe {
        FileProbe {
            cache: file_len(&self.cache_path(filename)).await,
            target: file_len(&self.target_path(filename)).await,
        }
    }

    /// Copy a verified cache file into the target directory
    pub async fn copy_to_target(&self, filename: &str) -> Result<u64> {
        let from = self.cache_path(filename);
        let to = self.target_path(filename);
        debug!("Using cached {} from {}", filename, self.cache_dir.display());
        fs::copy(&from, &to)
            .await
            .map_err(|source| SyncError::FileSystem {
                path: to,
                operation: FileOperation::Copy,
                source,
            })
    }

    /// Write downloaded bytes to both tiers
    pub async fn write_both(&self, filename: &str, data: &[u8]) -> Result<()> {
        for path in [self.cache_path(filename), self.target_path(filename)] {
            fs::write(&path, data)
                .await
                .map_err(|source| SyncError::FileSystem {
                    path,
                    operation: FileOperation::Write,
                    source,
                })?;
        }
        Ok(())
    }

    /// Best-effort removal of a file from both tiers
    ///
    /// Used by cancellation cleanup; a missing file is not an error and the
    /// call is a no-op when run twice.
    pub async fn remove_both(&self, filename: &str) {
        for path in [self.cache_path(filename), self.target_path(filename)] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed partial file {}", path.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => warn!("Could not remove {}: {}", path.display(), error),
            }
        }
    }

    /// Remove a stale file from the target directory only
    pub async fn remove_stale(&self, filename: &str) {
        let path = self.target_path(filename);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Deleted stale file {}", path.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!("Could not delete stale {}: {}", path.display(), error),
        }
    }
}

/// Length of a file, or None when absent/unreadable
pub(crate) async fn file_len(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Some(metadata.len()),
        _ => None,
    }
}
