//! Sync engine
//!
//! Reconciles a resolved set against the two-tier cache: probes lengths,
//! copies what the cache can satisfy, downloads the rest with a bounded
//! concurrency pool, verifies by byte length with bounded retry, and updates
//! the install history. Per-task failures are isolated; one bad mod never
//! takes the run down.

pub mod cache;
pub mod config;
pub mod configsync;
pub mod download;
pub mod error;
pub mod plan;

pub use cache::CacheStore;
pub use config::{RunMode, SyncOptions};
pub use configsync::{ConfigSyncReport, sync_config_archive};
pub use error::{FileOperation, Result, SyncError};
pub use plan::{SkipReason, SyncTask, TaskState};

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{HistoryRecord, ResolvedMod};
use crate::progress::{self, ProgressCallback, ProgressEvent};
use crate::sync::cache::file_len;

/// Staging directory name for config archives, under the cache dir
const CONFIG_STAGING_DIR: &str = "cached_config";

/// Outcome of one run
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// Filenames verified present at both tiers when the run ended
    pub installed: Vec<String>,
    pub cache_hits: usize,
    pub copied: usize,
    pub downloaded: usize,
    pub resourcepacks: usize,
    pub skipped: Vec<(String, SkipReason)>,
    /// Mod display name and the error that exhausted it
    pub failed: Vec<(String, String)>,
    /// Present in the previous record for this version, absent now
    pub stale: Vec<String>,
    pub cancelled: bool,
}

impl SyncSummary {
    /// Whether the run completed with nothing left behind
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

enum TaskOutcome {
    Installed { bytes: u64 },
    Failed { error: SyncError },
    Cancelled,
}

struct TaskReport {
    filename: String,
    display_name: String,
    outcome: TaskOutcome,
}

/// Drives downloads, verification, and history for one resolved set
pub struct SyncEngine {
    options: SyncOptions,
    client: Client,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl SyncEngine {
    pub fn new(options: SyncOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(&options.user_agent)
            .build()
            .map_err(|source| SyncError::Client { source })?;
        Ok(Self {
            options,
            client,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Use an externally configured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Token callers can use to interrupt the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reconcile `mods` against the cache and target directories
    ///
    /// Appends this run's record to `history` (the caller persists it) and
    /// reports stale files relative to the previous record for the same
    /// version id.
    pub async fn sync(
        &self,
        mods: &[ResolvedMod],
        version_id: &str,
        history: &mut Vec<HistoryRecord>,
    ) -> Result<SyncSummary> {
        self.create_directories().await?;

        let store = CacheStore::new(&self.options.cache_dir, &self.options.mods_dir);
        let plan = plan::build_plan(mods, &self.options, &store).await;

        let mut summary = SyncSummary {
            cache_hits: plan.cache_hits.len(),
            skipped: plan.skipped,
            ..SyncSummary::default()
        };
        let mut installed: Vec<String> = plan.cache_hits;

        progress::emit(
            &self.progress,
            ProgressEvent::SyncStarted {
                to_download: plan.tasks.len(),
                total: mods.len(),
            },
        );

        self.install_resourcepacks(plan.resourcepacks, &mut summary)
            .await;

        // Cache-satisfied targets never touch the network.
        for task in plan.copies {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if self.options.dry_run {
                summary.copied += 1;
                installed.push(task.filename);
                continue;
            }
            match store.copy_to_target(&task.filename).await {
                Ok(_) => {
                    summary.copied += 1;
                    installed.push(task.filename);
                }
                Err(error) => {
                    warn!("Could not restore {} from cache: {}", task.filename, error);
                    summary.failed.push((task.display_name, error.to_string()));
                }
            }
        }

        // Largest expected transfers dispatch first.
        let mut queue = plan.tasks;
        queue.sort_by(|a, b| {
            b.expected_length
                .unwrap_or(0)
                .cmp(&a.expected_length.unwrap_or(0))
        });

        if !queue.is_empty() {
            let reports: Vec<TaskReport> = stream::iter(queue)
                .map(|task| self.run_task(task, &store))
                .buffer_unordered(self.options.download_concurrency.max(1))
                .collect()
                .await;

            for report in reports {
                match report.outcome {
                    TaskOutcome::Installed { bytes } => {
                        debug!("Installed {} ({} bytes)", report.filename, bytes);
                        summary.downloaded += 1;
                        installed.push(report.filename);
                    }
                    TaskOutcome::Failed { error } => {
                        progress::emit(
                            &self.progress,
                            ProgressEvent::TaskFailed {
                                name: report.display_name.clone(),
                                error: error.to_string(),
                            },
                        );
                        summary.failed.push((report.display_name, error.to_string()));
                    }
                    TaskOutcome::Cancelled => summary.cancelled = true,
                }
            }
        } else {
            debug!("We do not have any mods to process");
        }

        if self.cancel.is_cancelled() {
            summary.cancelled = true;
        }

        installed.sort();
        installed.dedup();

        // A cancelled run records no history.
        if !self.options.dry_run && !summary.cancelled {
            self.update_history(version_id, &installed, history, &mut summary, &store)
                .await;
        }
        summary.installed = installed;

        Ok(summary)
    }

    /// Extract and apply a bundled config archive
    ///
    /// Staging lives under the cache directory so a partially applied
    /// archive never touches the live config dir.
    pub async fn sync_config(&self, archive: Vec<u8>) -> Result<ConfigSyncReport> {
        if self.options.dry_run {
            info!("[dry-run] Skipping config sync");
            return Ok(ConfigSyncReport::default());
        }
        sync_config_archive(
            archive,
            self.options.cache_dir.join(CONFIG_STAGING_DIR),
            self.options.config_dir.clone(),
            self.options.install_root.clone(),
        )
        .await
    }

    async fn create_directories(&self) -> Result<()> {
        for dir in [
            &self.options.mods_dir,
            &self.options.cache_dir,
            &self.options.resourcepack_dir,
            &self.options.config_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| SyncError::FileSystem {
                    path: dir.clone(),
                    operation: FileOperation::CreateDir,
                    source,
                })?;
            debug!("Ensured directory {}", dir.display());
        }
        Ok(())
    }

    /// Resource packs bypass the verify pipeline: fetched and placed as-is
    async fn install_resourcepacks(&self, packs: Vec<SyncTask>, summary: &mut SyncSummary) {
        for task in packs {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return;
            }
            info!("Saving resourcepack {}...", task.display_name);
            let body = match download::fetch_to_buffer(
                &self.client,
                &task.download_url,
                &task.display_name,
                task.expected_length,
                &self.cancel,
                &self.progress,
            )
            .await
            {
                Ok(body) => body,
                Err(SyncError::Cancelled { .. }) => {
                    summary.cancelled = true;
                    return;
                }
                Err(error) => {
                    warn!("Resourcepack {} failed: {}", task.display_name, error);
                    summary.failed.push((task.display_name, error.to_string()));
                    continue;
                }
            };
            if self.options.dry_run {
                summary.resourcepacks += 1;
                continue;
            }
            let dest = self.options.resourcepack_dir.join(&task.filename);
            match tokio::fs::write(&dest, &body).await {
                Ok(()) => summary.resourcepacks += 1,
                Err(source) => {
                    let error = SyncError::FileSystem {
                        path: dest,
                        operation: FileOperation::Write,
                        source,
                    };
                    summary.failed.push((task.display_name, error.to_string()));
                }
            }
        }
    }

    /// Run one task through download, dual write, and verification
    async fn run_task(&self, mut task: SyncTask, store: &CacheStore) -> TaskReport {
        if self.cancel.is_cancelled() {
            return TaskReport {
                filename: task.filename.clone(),
                display_name: task.display_name,
                outcome: TaskOutcome::Cancelled,
            };
        }

        let max_retries = self.options.verify_retries;
        let mut delays = ExponentialBackoff::from_millis(2)
            .factor((self.options.retry_delay.as_millis() as u64 / 2).max(1))
            .max_delay(self.options.max_retry_delay);
        let mut last_error: Option<SyncError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                task.state = TaskState::Retrying;
                progress::emit(
                    &self.progress,
                    ProgressEvent::RetryAttempt {
                        name: task.display_name.clone(),
                        attempt,
                        max_attempts: max_retries,
                    },
                );
                let delay = delays.next().unwrap_or(self.options.max_retry_delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        store.remove_both(&task.filename).await;
                        return self.cancelled_report(task);
                    }
                }
            }

            task.state = TaskState::Downloading;
            let body = match download::fetch_to_buffer(
                &self.client,
                &task.download_url,
                &task.display_name,
                task.expected_length,
                &self.cancel,
                &self.progress,
            )
            .await
            {
                Ok(body) => body,
                Err(SyncError::Cancelled { .. }) => {
                    // In-flight cancellation: neither tier keeps a partial file.
                    store.remove_both(&task.filename).await;
                    return self.cancelled_report(task);
                }
                Err(error) if error.is_recoverable() && attempt < max_retries => {
                    warn!(
                        "Download of {} failed (attempt {}/{}): {}",
                        task.display_name,
                        attempt + 1,
                        max_retries + 1,
                        error
                    );
                    last_error = Some(error);
                    continue;
                }
                Err(error) => return self.failed_report(task, error),
            };

            if self.options.dry_run {
                match self.check_length(&task, body.len() as u64) {
                    Ok(bytes) => {
                        task.state = TaskState::Installed;
                        return TaskReport {
                            filename: task.filename.clone(),
                            display_name: task.display_name,
                            outcome: TaskOutcome::Installed { bytes },
                        };
                    }
                    Err(error) => {
                        last_error = Some(error);
                        continue;
                    }
                }
            }

            // Full body received; flush to both tiers.
            if let Err(error) = store.write_both(&task.filename, &body).await {
                return self.failed_report(task, error);
            }
            if self.cancel.is_cancelled() {
                store.remove_both(&task.filename).await;
                return self.cancelled_report(task);
            }

            task.state = TaskState::Verifying;
            match self.verify_on_disk(&task, store).await {
                Ok(bytes) => {
                    task.state = TaskState::Installed;
                    return TaskReport {
                        filename: task.filename.clone(),
                        display_name: task.display_name,
                        outcome: TaskOutcome::Installed { bytes },
                    };
                }
                Err(error) => {
                    warn!(
                        "Failed to verify {} (attempt {}/{}): {}",
                        task.filename,
                        attempt + 1,
                        max_retries + 1,
                        error
                    );
                    last_error = Some(error);
                }
            }
        }

        task.state = TaskState::Failed;
        let error = SyncError::MaxRetriesExceeded {
            name: task.display_name.clone(),
            attempts: max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error recorded".to_string()),
        };
        self.failed_report(task, error)
    }

    /// Compare the on-disk length at both tiers against the expectation
    async fn verify_on_disk(&self, task: &SyncTask, store: &CacheStore) -> Result<u64> {
        let Some(expected) = task.expected_length else {
            return Ok(file_len(&store.cache_path(&task.filename)).await.unwrap_or(0));
        };
        for path in [
            store.cache_path(&task.filename),
            store.target_path(&task.filename),
        ] {
            let actual = file_len(&path).await.unwrap_or(0);
            if actual != expected {
                return Err(SyncError::SizeMismatch {
                    file: path,
                    expected,
                    actual,
                    diff: actual as i64 - expected as i64,
                });
            }
        }
        Ok(expected)
    }

    fn check_length(&self, task: &SyncTask, actual: u64) -> Result<u64> {
        match task.expected_length {
            Some(expected) if expected != actual => Err(SyncError::SizeMismatch {
                file: std::path::PathBuf::from(&task.filename),
                expected,
                actual,
                diff: actual as i64 - expected as i64,
            }),
            _ => Ok(actual),
        }
    }

    fn failed_report(&self, mut task: SyncTask, error: SyncError) -> TaskReport {
        task.state = TaskState::Failed;
        TaskReport {
            filename: task.filename.clone(),
            display_name: task.display_name,
            outcome: TaskOutcome::Failed { error },
        }
    }

    fn cancelled_report(&self, task: SyncTask) -> TaskReport {
        info!(
            "Flagging {} for deletion as it was in the middle of being downloaded",
            task.filename
        );
        TaskReport {
            filename: task.filename.clone(),
            display_name: task.display_name,
            outcome: TaskOutcome::Cancelled,
        }
    }

    /// Append this run's record and diff against the previous one
    async fn update_history(
        &self,
        version_id: &str,
        installed: &[String],
        history: &mut Vec<HistoryRecord>,
        summary: &mut SyncSummary,
        store: &CacheStore,
    ) {
        let record = HistoryRecord {
            version_id: version_id.to_string(),
            filenames: installed.to_vec(),
        };

        if let Some(previous) = history
            .iter()
            .rev()
            .find(|record| record.version_id == version_id)
        {
            for old in &previous.filenames {
                if !record.filenames.contains(old) {
                    info!("{}: flagged as stale", old);
                    summary.stale.push(old.clone());
                }
            }
        }

        if self.options.delete_stale {
            for filename in &summary.stale {
                store.remove_stale(filename).await;
            }
        }

        // Prior records are retained; pruning is somebody else's policy.
        history.push(record);
    }
}
