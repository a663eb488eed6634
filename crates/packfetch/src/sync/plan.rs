//! Sync planning
//!
//! Pre-filters the resolved set, probes both cache tiers, and buckets every
//! schedulable mod into its starting state before any network work begins.

use tracing::{debug, info, warn};

use crate::model::ResolvedMod;
use crate::sync::cache::{CacheStore, FileProbe};
use crate::sync::config::{RunMode, SyncOptions};

/// Per-task lifecycle states
///
/// ```text
/// Unchecked -> CacheHit -> Installed            (no network)
/// Unchecked -> NeedsDownload | Mismatched -> Downloading -> Verifying
///           -> Installed | Retrying -> Downloading ... -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unchecked,
    CacheHit,
    NeedsDownload,
    Mismatched,
    Downloading,
    Verifying,
    Installed,
    Retrying,
    Failed,
}

/// One schedulable unit of download work
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub filename: String,
    pub download_url: String,
    /// Remote-reported length; None disables length verification
    pub expected_length: Option<u64>,
    pub display_name: String,
    pub state: TaskState,
}

impl SyncTask {
    fn from_mod(resolved: &ResolvedMod, filename: &str, url: &str, state: TaskState) -> Self {
        Self {
            filename: filename.to_string(),
            download_url: url.to_string(),
            expected_length: resolved.file_length,
            display_name: resolved.name.clone(),
            state,
        }
    }
}

/// Why a mod was excluded from the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Server-only mod during a client-only run
    ServerOnly,
    /// Client-only mod during a server-only run
    ClientOnly,
    /// On the platform incompatibility list for this host
    PlatformIncompatible,
    /// No filename or download URL to schedule
    Unresolvable,
}

/// Scheduling decision for one mod before any network work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Both tiers verified, nothing to do
    Hit,
    /// Cache verified, target missing: copy without re-downloading
    Copy,
    /// Enter the download pipeline in the given starting state
    Fetch(TaskState),
}

/// Everything the engine needs to drive one run
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Download pipeline input (NeedsDownload / Mismatched)
    pub tasks: Vec<SyncTask>,
    /// Cache verified, copy straight to target
    pub copies: Vec<SyncTask>,
    /// Verified at both tiers already
    pub cache_hits: Vec<String>,
    /// Routed to the resource pack directory, no verification
    pub resourcepacks: Vec<SyncTask>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Classify one filename against its observed lengths
fn classify(probe: FileProbe, expected: Option<u64>) -> Placement {
    // A zero-length target is treated as absent for the copy path.
    let target_nonzero = probe.target.filter(|len| *len > 0);
    match expected {
        Some(expected) => {
            if probe.cache == Some(expected) && target_nonzero == Some(expected) {
                Placement::Hit
            } else if probe.cache == Some(expected) && target_nonzero.is_none() {
                Placement::Copy
            } else if probe.cache.is_none() || probe.target.is_none() {
                Placement::Fetch(TaskState::NeedsDownload)
            } else {
                Placement::Fetch(TaskState::Mismatched)
            }
        }
        // Nothing to verify against: any present file is taken as-is.
        None => {
            if probe.cache.is_some() && target_nonzero.is_some() {
                Placement::Hit
            } else if probe.cache.is_some() {
                Placement::Copy
            } else {
                Placement::Fetch(TaskState::NeedsDownload)
            }
        }
    }
}

/// Build the run plan for a resolved set
pub(crate) async fn build_plan(
    mods: &[ResolvedMod],
    options: &SyncOptions,
    store: &CacheStore,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    info!("Verifying cached mods...");

    for resolved in mods {
        let (Some(filename), Some(url)) = (&resolved.filename, &resolved.download_url) else {
            warn!(
                "Couldn't find a download file for {}, skipping",
                resolved.slug
            );
            plan.skipped
                .push((resolved.slug.clone(), SkipReason::Unresolvable));
            continue;
        };

        if resolved.resourcepack {
            plan.resourcepacks.push(SyncTask::from_mod(
                resolved,
                filename,
                url,
                TaskState::Unchecked,
            ));
            continue;
        }

        match options.mode {
            RunMode::ClientOnly if resolved.server_only => {
                info!("Skipping server mod {}", resolved.name);
                plan.skipped
                    .push((resolved.name.clone(), SkipReason::ServerOnly));
                continue;
            }
            RunMode::ServerOnly if resolved.client_only => {
                info!("Skipping clientside mod {}", resolved.name);
                plan.skipped
                    .push((resolved.name.clone(), SkipReason::ClientOnly));
                continue;
            }
            _ => {}
        }

        if options.apply_platform_denylist
            && options
                .platform_denylist
                .iter()
                .any(|needle| filename.contains(needle.as_str()))
        {
            info!("Skipping {} on this platform", filename);
            plan.skipped
                .push((resolved.name.clone(), SkipReason::PlatformIncompatible));
            continue;
        }

        let probe = store.probe(filename).await;
        match classify(probe, resolved.file_length) {
            Placement::Hit => {
                debug!("Verified cached mod {}", filename);
                plan.cache_hits.push(filename.clone());
            }
            Placement::Copy => {
                plan.copies.push(SyncTask::from_mod(
                    resolved,
                    filename,
                    url,
                    TaskState::CacheHit,
                ));
            }
            Placement::Fetch(state) => {
                if state == TaskState::Mismatched {
                    let mismatch = probe
                        .cache
                        .into_iter()
                        .chain(probe.target)
                        .find(|len| Some(*len) != resolved.file_length);
                    info!(
                        "Failed to verify cached mod {} ({:?} vs expected {:?}), scheduling",
                        filename, mismatch, resolved.file_length
                    );
                }
                plan.tasks
                    .push(SyncTask::from_mod(resolved, filename, url, state));
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(cache: Option<u64>, target: Option<u64>) -> FileProbe {
        FileProbe { cache, target }
    }

    #[test]
    fn both_tiers_verified_is_a_hit() {
        assert_eq!(classify(probe(Some(10), Some(10)), Some(10)), Placement::Hit);
    }

    #[test]
    fn verified_cache_with_missing_or_empty_target_copies() {
        assert_eq!(classify(probe(Some(10), None), Some(10)), Placement::Copy);
        assert_eq!(classify(probe(Some(10), Some(0)), Some(10)), Placement::Copy);
    }

    #[test]
    fn absent_files_need_download() {
        assert_eq!(
            classify(probe(None, None), Some(10)),
            Placement::Fetch(TaskState::NeedsDownload)
        );
        assert_eq!(
            classify(probe(None, Some(10)), Some(10)),
            Placement::Fetch(TaskState::NeedsDownload)
        );
    }

    #[test]
    fn wrong_lengths_are_mismatched() {
        assert_eq!(
            classify(probe(Some(9), Some(10)), Some(10)),
            Placement::Fetch(TaskState::Mismatched)
        );
        assert_eq!(
            classify(probe(Some(10), Some(7)), Some(10)),
            Placement::Fetch(TaskState::Mismatched)
        );
    }

    #[test]
    fn unknown_length_takes_present_files_as_valid() {
        assert_eq!(classify(probe(Some(3), Some(3)), None), Placement::Hit);
        assert_eq!(classify(probe(Some(3), None), None), Placement::Copy);
        assert_eq!(
            classify(probe(None, None), None),
            Placement::Fetch(TaskState::NeedsDownload)
        );
    }
}
