//! Mod catalog access
//!
//! The catalog is a read-only directory of mods and the files published for
//! them. Resolution consults it through the [`CatalogProvider`] trait so the
//! same code path works against an in-memory snapshot ([`SnapshotCatalog`]),
//! a live service ([`HttpCatalog`]), or a layered combination of both.

pub mod error;
pub mod http;
pub mod snapshot;

pub use error::{CatalogError, Result};
pub use http::HttpCatalog;
pub use snapshot::SnapshotCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mod loader a catalog file was built against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModLoader {
    Forge,
    Fabric,
    /// Loader-agnostic file, compatible with everything
    Any,
}

impl ModLoader {
    /// Whether a file built for `self` can run under the target loader
    pub fn compatible_with(self, target: ModLoader) -> bool {
        self == ModLoader::Any || self == target
    }

    /// Parse the loader name used in manifests ("forge" / "fabric")
    pub fn from_name(name: &str) -> Option<ModLoader> {
        match name.to_ascii_lowercase().as_str() {
            "forge" => Some(ModLoader::Forge),
            "fabric" => Some(ModLoader::Fabric),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModLoader::Forge => write!(f, "forge"),
            ModLoader::Fabric => write!(f, "fabric"),
            ModLoader::Any => write!(f, "any"),
        }
    }
}

// Wire format uses the upstream numeric loader codes.
const LOADER_FORGE: u8 = 1;
const LOADER_FABRIC: u8 = 4;

fn mod_loader_from_code<'de, D>(deserializer: D) -> std::result::Result<ModLoader, D::Error>
where
    D: Deserializer<'de>,
{
    let code = Option::<u8>::deserialize(deserializer)?;
    Ok(match code {
        Some(LOADER_FORGE) => ModLoader::Forge,
        Some(LOADER_FABRIC) => ModLoader::Fabric,
        _ => ModLoader::Any,
    })
}

/// Relationship kinds a file can declare towards another catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Embedded,
    Optional,
    Required,
    Tool,
    Incompatible,
    Include,
    Other(u8),
}

impl From<u8> for DependencyKind {
    fn from(code: u8) -> Self {
        match code {
            1 => DependencyKind::Embedded,
            2 => DependencyKind::Optional,
            3 => DependencyKind::Required,
            4 => DependencyKind::Tool,
            5 => DependencyKind::Incompatible,
            6 => DependencyKind::Include,
            other => DependencyKind::Other(other),
        }
    }
}

/// A dependency declared by a catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDependency {
    #[serde(rename = "addonId")]
    pub addon_id: u32,
    #[serde(rename = "type", deserialize_with = "dependency_kind_from_code")]
    pub kind: DependencyKind,
}

fn dependency_kind_from_code<'de, D>(
    deserializer: D,
) -> std::result::Result<DependencyKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(DependencyKind::from(u8::deserialize(deserializer)?))
}

/// A downloadable file belonging to a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(rename = "gameVersion", default)]
    pub game_versions: Vec<String>,
    #[serde(
        rename = "modLoader",
        default = "default_mod_loader",
        deserialize_with = "mod_loader_from_code"
    )]
    pub mod_loader: ModLoader,
    #[serde(rename = "projectFileId")]
    pub file_id: u32,
    #[serde(rename = "fileDate")]
    pub file_date: DateTime<Utc>,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileLength", default)]
    pub file_length: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<CatalogDependency>,
}

fn default_mod_loader() -> ModLoader {
    ModLoader::Any
}

impl CatalogFile {
    /// Ids of the required dependencies declared by this file
    pub fn required_dependencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.dependencies
            .iter()
            .filter(|dep| dep.kind == DependencyKind::Required)
            .map(|dep| dep.addon_id)
    }
}

/// A mod entry as published by the catalog
///
/// Immutable snapshot data; the resolver never mutates entries, it only
/// selects files out of them.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    // The live API calls this field gameVersionLatestFiles on by-id lookups.
    #[serde(
        rename = "latest_files",
        alias = "gameVersionLatestFiles",
        default
    )]
    pub files: Vec<CatalogFile>,
}

/// Read-only source of mod metadata
///
/// `search` differs from `entry_by_slug` for live implementations: it asks
/// the remote service to look the slug up instead of relying on a local
/// index, and is used as the fallback when the primary lookup misses.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn entry_by_id(&self, id: u32) -> Result<Option<CatalogEntry>>;

    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>>;

    async fn search(&self, slug: &str) -> Result<Option<CatalogEntry>>;
}

/// Snapshot-backed catalog with a live service behind it
///
/// Slug lookups hit the snapshot only; by-id lookups fall through to the
/// remote service when the snapshot misses (explicit ids can point at mods
/// the snapshot never indexed); `search` always asks the remote service when
/// one is attached.
pub struct LayeredCatalog {
    snapshot: SnapshotCatalog,
    remote: Option<HttpCatalog>,
}

impl LayeredCatalog {
    pub fn new(snapshot: SnapshotCatalog, remote: Option<HttpCatalog>) -> Self {
        Self { snapshot, remote }
    }
}

#[async_trait]
impl CatalogProvider for LayeredCatalog {
    async fn entry_by_id(&self, id: u32) -> Result<Option<CatalogEntry>> {
        if let Some(entry) = self.snapshot.entry_by_id(id).await? {
            return Ok(Some(entry));
        }
        match &self.remote {
            Some(remote) => remote.entry_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        self.snapshot.entry_by_slug(slug).await
    }

    async fn search(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        match &self.remote {
            Some(remote) => remote.search(slug).await,
            None => self.snapshot.entry_by_slug(slug).await,
        }
    }
}

/// Memoizing catalog decorator
///
/// Caches by-id lookups for the duration of a run so each catalog id is
/// fetched at most once. This doubles as the cycle guard for dependency
/// expansion: a revisited id is answered from the cache without touching the
/// network.
pub struct MemoCatalog {
    inner: Arc<dyn CatalogProvider>,
    by_id: Mutex<HashMap<u32, Option<CatalogEntry>>>,
}

impl MemoCatalog {
    pub fn new(inner: Arc<dyn CatalogProvider>) -> Self {
        Self {
            inner,
            by_id: Mutex::new(HashMap::new()),
        }
    }

    pub async fn entry_by_id(&self, id: u32) -> Result<Option<CatalogEntry>> {
        if let Some(cached) = self.by_id.lock().await.get(&id) {
            return Ok(cached.clone());
        }
        // The lock is not held across the fetch.
        let fetched = self.inner.entry_by_id(id).await?;
        self.by_id
            .lock()
            .await
            .insert(id, fetched.clone());
        Ok(fetched)
    }

    pub async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        self.inner.entry_by_slug(slug).await
    }

    pub async fn search(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        self.inner.search(slug).await
    }
}
