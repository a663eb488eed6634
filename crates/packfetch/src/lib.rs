//! packfetch
//!
//! Turns a declarative mod manifest into a concrete, verified set of
//! installed files. Two subsystems do the heavy lifting: the resolver maps
//! manifest entries to downloadable artifacts by querying a mod catalog and
//! expanding required-dependency closures, and the sync engine reconciles
//! the resolved set against a two-tier on-disk cache with concurrent,
//! length-verified downloads.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use packfetch::{
//!     Manifest, Resolver, SnapshotCatalog, SyncEngine, SyncOptions,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Parse the manifest and load a catalog snapshot.
//! let manifest = Manifest::load("manifest.yml".as_ref()).await?;
//! let snapshot = tokio::fs::read("curseforge.json").await?;
//! let catalog = Arc::new(SnapshotCatalog::from_json(&snapshot)?);
//!
//! // Resolve it into a concrete artifact list.
//! let resolver = Resolver::new(catalog, manifest.config.clone());
//! let resolution = resolver.resolve(&manifest.entries).await?;
//!
//! // Reconcile against the cache and target directories.
//! let engine = SyncEngine::new(SyncOptions::default())?;
//! let mut history = Vec::new();
//! let summary = engine.sync(&resolution.mods, "local", &mut history).await?;
//! println!("{} mods installed", summary.installed.len());
//! # Ok(())
//! # }
//! ```
//!
//! Verification is by byte length against the remote-reported size, not by
//! cryptographic hash; treat it as transfer integrity, not authenticity.

pub mod catalog;
pub mod lockfile;
pub mod manifest;
pub mod model;
pub mod progress;
pub mod release;
pub mod resolve;
pub mod sync;

pub use catalog::{
    CatalogEntry, CatalogError, CatalogFile, CatalogProvider, DependencyKind, HttpCatalog,
    LayeredCatalog, MemoCatalog, ModLoader, SnapshotCatalog,
};
pub use lockfile::{HistoryStore, LockfileError, LockfileStore};
pub use manifest::{EntryOptions, Manifest, ManifestEntry, ManifestError, ManifestRequest, ModpackConfig};
pub use model::{HistoryRecord, ResolvedMod};
pub use progress::{ProgressCallback, ProgressEvent};
pub use release::{PackRelease, ReleaseClient, ReleaseError};
pub use resolve::{Resolution, ResolveError, ResolveReport, Resolver, ResolverOptions};
pub use sync::{
    RunMode, SkipReason, SyncEngine, SyncError, SyncOptions, SyncSummary, TaskState,
};

#[cfg(test)]
mod tests;
