//! Lockfile and install-history persistence
//!
//! The lockfile is the machine-consumed product of resolution: an ordered
//! JSON array of resolved mods. A pretty-printed companion can be written
//! next to it for humans. Install history lives in its own JSON file and is
//! only ever appended to.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{HistoryRecord, ResolvedMod};

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("failed to access '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON for '{path}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, LockfileError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LockfileError + '_ {
    move |source| LockfileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads and writes the resolved-set lockfile
pub struct LockfileStore {
    path: PathBuf,
    pretty_path: Option<PathBuf>,
}

impl LockfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty_path: None,
        }
    }

    /// Also write a pretty-printed companion file
    pub fn with_pretty_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pretty_path = Some(path.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<ResolvedMod>> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(io_error(&self.path))?;
        Self::decode(&data, &self.path)
    }

    /// Decode lockfile bytes fetched from somewhere other than `path`
    pub fn decode(data: &[u8], origin: &Path) -> Result<Vec<ResolvedMod>> {
        serde_json::from_slice(data).map_err(|source| LockfileError::Json {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub async fn write(&self, mods: &[ResolvedMod]) -> Result<()> {
        info!("Saving lockfile to {}", self.path.display());
        let compact = serde_json::to_vec(mods).map_err(|source| LockfileError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, compact)
            .await
            .map_err(io_error(&self.path))?;

        if let Some(pretty_path) = &self.pretty_path {
            debug!("Saving pretty-printed lockfile to {}", pretty_path.display());
            let pretty = serde_json::to_vec_pretty(mods).map_err(|source| LockfileError::Json {
                path: pretty_path.clone(),
                source,
            })?;
            tokio::fs::write(pretty_path, pretty)
                .await
                .map_err(io_error(pretty_path))?;
        }
        Ok(())
    }
}

/// Reads and writes the append-only install history
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load history; a missing file is an empty history
    pub async fn load(&self) -> Result<Vec<HistoryRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| LockfileError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(LockfileError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub async fn save(&self, history: &[HistoryRecord]) -> Result<()> {
        debug!("Writing install history to {}", self.path.display());
        let data = serde_json::to_vec(history).map_err(|source| LockfileError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(io_error(&self.path))
    }
}
