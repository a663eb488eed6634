//! Manifest resolution
//!
//! Maps manifest entries to concrete downloadable artifacts: catalog lookup
//! per entry, file selection for the target version/loader, and expansion of
//! the required-dependency closure. Lookups fan out concurrently with a
//! bounded pool; the coordinator merges results back in manifest order so the
//! resolved set is deterministic regardless of network completion order.

pub mod error;
pub mod selection;

pub use error::{ResolveError, Result};
pub use selection::select_file;

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::{CatalogProvider, MemoCatalog};
use crate::manifest::{EntryOptions, ManifestEntry, ModpackConfig};
use crate::model::ResolvedMod;
use crate::progress::{self, ProgressCallback, ProgressEvent};

/// Tunables for a resolution run
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Fall back to the catalog's search capability when a slug lookup
    /// misses; disabling makes a miss fatal
    pub fallback_search: bool,
    /// Promote soft resolution failures to fatal errors
    pub strict: bool,
    /// Bound on concurrent per-entry lookups
    pub concurrency: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fallback_search: true,
            strict: false,
            concurrency: 8,
        }
    }
}

/// Soft failures collected during resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveReport {
    /// Slugs (or `#id` placeholders for dependencies) not found anywhere
    pub left_behind: Vec<String>,
    /// Slugs found in the catalog but with no compatible file
    pub unresolved_files: Vec<String>,
}

impl ResolveReport {
    pub fn is_clean(&self) -> bool {
        self.left_behind.is_empty() && self.unresolved_files.is_empty()
    }
}

/// Output of a resolution run: the resolved set plus its soft-failure report
#[derive(Debug)]
pub struct Resolution {
    pub mods: Vec<ResolvedMod>,
    pub report: ResolveReport,
}

enum EntryOutcome {
    /// Entry resolved to a concrete file; `deps` are its required dependency ids
    Resolved {
        resolved: ResolvedMod,
        deps: Vec<u32>,
    },
    /// Entry found in the catalog but no file fits the target
    NoFile { resolved: ResolvedMod },
    /// Entry not found anywhere, recorded and carried no further
    LeftBehind { slug: String },
}

/// Resolver over a catalog provider
pub struct Resolver {
    catalog: MemoCatalog,
    config: ModpackConfig,
    options: ResolverOptions,
    progress: Option<ProgressCallback>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn CatalogProvider>, config: ModpackConfig) -> Self {
        Self {
            catalog: MemoCatalog::new(catalog),
            config,
            options: ResolverOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Resolve manifest entries into a resolved set
    ///
    /// Validation failures (duplicate keys, explicit-id mismatch) abort
    /// before any concurrent lookups start. Per-entry failures are isolated:
    /// they land in the report and the run continues.
    pub async fn resolve(&self, entries: &[ManifestEntry]) -> Result<Resolution> {
        check_duplicate_keys(entries)?;
        self.verify_explicit_ids(entries).await?;

        progress::emit(
            &self.progress,
            ProgressEvent::ResolveStarted {
                entries: entries.len(),
            },
        );

        // Bounded fan-out; buffered() yields results in submission order, so
        // the merge below sees entries in manifest order no matter how the
        // underlying lookups interleave.
        let outcomes: Vec<Result<EntryOutcome>> = stream::iter(entries)
            .map(|entry| self.resolve_entry(entry))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut mods: Vec<ResolvedMod> = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();
        let mut report = ResolveReport::default();

        for outcome in outcomes {
            match outcome? {
                EntryOutcome::Resolved { resolved, deps } => {
                    if !push_unique(&mut mods, &mut seen, resolved) {
                        continue;
                    }
                    self.expand_dependencies(deps, &mut mods, &mut seen, &mut report)
                        .await;
                }
                EntryOutcome::NoFile { resolved } => {
                    report.unresolved_files.push(resolved.slug.clone());
                    push_unique(&mut mods, &mut seen, resolved);
                }
                EntryOutcome::LeftBehind { slug } => {
                    progress::emit(
                        &self.progress,
                        ProgressEvent::ModLeftBehind { slug: slug.clone() },
                    );
                    report.left_behind.push(slug);
                }
            }
        }

        Ok(Resolution { mods, report })
    }

    /// Explicit ids are authoritative; verify them before any fan-out so a
    /// manifest typo aborts the run with nothing half-done.
    async fn verify_explicit_ids(&self, entries: &[ManifestEntry]) -> Result<()> {
        for entry in entries {
            let options = entry.options();
            if options.url.is_some() {
                continue;
            }
            let Some(id) = options.id else { continue };
            let fetched = self
                .catalog
                .entry_by_id(id)
                .await?
                .ok_or_else(|| ResolveError::UnknownId {
                    id,
                    slug: entry.key.clone(),
                })?;
            if fetched.slug != entry.key {
                return Err(ResolveError::SlugMismatch {
                    expected: entry.key.clone(),
                    found: fetched.slug,
                    id,
                });
            }
            debug!("Verified explicit id {} for {}", id, entry.key);
        }
        Ok(())
    }

    async fn resolve_entry(&self, entry: &ManifestEntry) -> Result<EntryOutcome> {
        let options = entry.options();

        if let Some(url) = &options.url {
            return Ok(self.resolve_custom(entry, url, &options).await);
        }

        let lookup = match options.id {
            // Already verified; answered from the memo without a refetch.
            Some(id) => self.catalog.entry_by_id(id).await,
            None => self.catalog.entry_by_slug(&entry.key).await,
        };
        let mut found = match lookup {
            Ok(found) => found,
            Err(error) => {
                warn!("Catalog lookup for {} failed: {}", entry.key, error);
                None
            }
        };

        if found.is_none() && self.options.fallback_search {
            found = match self.catalog.search(&entry.key).await {
                Ok(found) => found,
                Err(error) => {
                    warn!("Catalog search for {} failed: {}", entry.key, error);
                    None
                }
            };
        }

        let Some(catalog_entry) = found else {
            if !self.options.fallback_search || self.options.strict {
                return Err(ResolveError::NotFound {
                    slug: entry.key.clone(),
                });
            }
            warn!(
                "{} was not found in the catalog, leaving it behind",
                entry.key
            );
            return Ok(EntryOutcome::LeftBehind {
                slug: entry.key.clone(),
            });
        };

        match select_file(&catalog_entry, &self.config) {
            Some(file) => {
                info!(
                    "Resolved {}! [{}] [{}]",
                    catalog_entry.name, catalog_entry.slug, catalog_entry.id
                );
                progress::emit(
                    &self.progress,
                    ProgressEvent::ModResolved {
                        slug: catalog_entry.slug.clone(),
                        name: catalog_entry.name.clone(),
                        id: catalog_entry.id,
                    },
                );
                let deps = file.required_dependencies().collect();
                Ok(EntryOutcome::Resolved {
                    resolved: ResolvedMod::from_catalog(&catalog_entry, file, &options),
                    deps,
                })
            }
            None => {
                if self.options.strict {
                    return Err(ResolveError::NoCompatibleFile {
                        slug: entry.key.clone(),
                        version: self.config.version.clone(),
                    });
                }
                warn!(
                    "{} [{}] has no apparent file for {}, tread with caution",
                    catalog_entry.slug, catalog_entry.name, self.config.version
                );
                Ok(EntryOutcome::NoFile {
                    resolved: ResolvedMod::without_file(&catalog_entry, &options),
                })
            }
        }
    }

    async fn resolve_custom(
        &self,
        entry: &ManifestEntry,
        url: &str,
        options: &EntryOptions,
    ) -> EntryOutcome {
        let filename = filename_from_url(url);
        // Back-fill the catalog identity when the slug is known; download
        // data always comes from the override URL.
        let identity = match self.catalog.entry_by_slug(&entry.key).await {
            Ok(Some(known)) => Some((known.id, known.name)),
            Ok(None) => None,
            Err(error) => {
                debug!("Identity back-fill for {} failed: {}", entry.key, error);
                None
            }
        };
        info!(
            "Using custom URL {} for mod {}{}",
            url,
            entry.key,
            identity
                .as_ref()
                .map(|(id, _)| format!(" (known to the catalog as id {id})"))
                .unwrap_or_default()
        );
        EntryOutcome::Resolved {
            resolved: ResolvedMod::custom(&entry.key, url, filename, identity, options),
            deps: Vec::new(),
        }
    }

    /// Walk the required-dependency closure of one resolved entry
    ///
    /// Insertions land directly after the triggering entry. Failures here
    /// are always soft: a dependency that cannot be fetched or has no
    /// compatible file is recorded and the walk continues.
    async fn expand_dependencies(
        &self,
        roots: Vec<u32>,
        mods: &mut Vec<ResolvedMod>,
        seen: &mut HashSet<u32>,
        report: &mut ResolveReport,
    ) {
        let mut queue: VecDeque<u32> = roots.into();
        while let Some(dep_id) = queue.pop_front() {
            if !seen.insert(dep_id) {
                continue;
            }
            let entry = match self.catalog.entry_by_id(dep_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!("Dependency {} does not exist in the catalog", dep_id);
                    report.left_behind.push(format!("#{dep_id}"));
                    continue;
                }
                Err(error) => {
                    warn!("Dependency {} could not be fetched: {}", dep_id, error);
                    report.left_behind.push(format!("#{dep_id}"));
                    continue;
                }
            };
            match select_file(&entry, &self.config) {
                Some(file) => {
                    info!("Resolving dependency {} [{}]", entry.name, entry.slug);
                    progress::emit(
                        &self.progress,
                        ProgressEvent::DependencyResolved {
                            slug: entry.slug.clone(),
                            name: entry.name.clone(),
                        },
                    );
                    queue.extend(file.required_dependencies());
                    mods.push(ResolvedMod::dependency(&entry, file));
                }
                None => {
                    warn!(
                        "Dependency {} has no apparent file for {}",
                        entry.slug, self.config.version
                    );
                    report.unresolved_files.push(entry.slug.clone());
                }
            }
        }
    }
}

/// Append a resolved mod unless its id is already present
///
/// When the id is already taken (added earlier as someone's dependency), the
/// manifest-level flags are merged onto the existing record instead: the set
/// holds at most one mod per id.
fn push_unique(mods: &mut Vec<ResolvedMod>, seen: &mut HashSet<u32>, resolved: ResolvedMod) -> bool {
    if let Some(id) = resolved.id {
        if !seen.insert(id) {
            if let Some(existing) = mods.iter_mut().find(|m| m.id == Some(id)) {
                debug!(
                    "{} already resolved as a dependency, merging manifest flags",
                    resolved.slug
                );
                existing.client_only |= resolved.client_only;
                existing.server_only |= resolved.server_only;
                existing.optional |= resolved.optional;
            }
            return false;
        }
    }
    mods.push(resolved);
    true
}

fn check_duplicate_keys(entries: &[ManifestEntry]) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.key.as_str()).or_insert(0) += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ResolveError::DuplicateKeys { keys: duplicates })
    }
}

/// Derive a filename from a custom download URL
///
/// Query-string-style distribution links encode the real filename after an
/// `=`, so anything past the last `=` wins; otherwise the path basename is
/// used.
fn filename_from_url(url: &str) -> String {
    if let Some((_, tail)) = url.rsplit_once('=') {
        return tail.to_string();
    }
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string()),
        Err(_) => url.rsplit('/').next().unwrap_or(url).to_string(),
    }
}
