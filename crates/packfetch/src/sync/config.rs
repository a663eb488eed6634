//! Configuration for sync runs

use std::path::PathBuf;
use std::time::Duration;

/// Which side of the pack a run installs for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Install everything
    #[default]
    Full,
    /// Skip server-only mods
    ClientOnly,
    /// Skip client-only mods
    ServerOnly,
}

/// Tunables and directory layout for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Live mods directory (the target the game loads from)
    pub mods_dir: PathBuf,
    /// Durable artifact cache, survives target wipes
    pub cache_dir: PathBuf,
    /// Destination for resource-pack style content
    pub resourcepack_dir: PathBuf,
    /// Live configuration directory
    pub config_dir: PathBuf,
    /// Install root, receives the companion descriptor file
    pub install_root: PathBuf,
    pub mode: RunMode,
    /// Perform transfers but write nothing to disk
    pub dry_run: bool,
    /// Physically delete files flagged as stale (off by default; the stale
    /// report is always produced)
    pub delete_stale: bool,
    /// Bound on concurrent downloads
    pub download_concurrency: usize,
    /// Verification retry budget per task
    pub verify_retries: usize,
    /// Initial backoff delay between verification retries (doubles each try)
    pub retry_delay: Duration,
    /// Backoff cap
    pub max_retry_delay: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Filename substrings to skip on incompatible platforms
    pub platform_denylist: Vec<String>,
    /// Whether the denylist applies to this run (defaults to macOS hosts)
    pub apply_platform_denylist: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mods_dir: PathBuf::from(".minecraft/mods"),
            cache_dir: PathBuf::from(".cache/mods"),
            resourcepack_dir: PathBuf::from(".minecraft/resourcepacks"),
            config_dir: PathBuf::from(".minecraft/config"),
            install_root: PathBuf::from("."),
            mode: RunMode::Full,
            dry_run: false,
            delete_stale: false,
            download_concurrency: 4,
            verify_retries: 3,
            retry_delay: Duration::from_millis(1000),
            max_retry_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(120),
            user_agent: concat!("packfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            platform_denylist: vec!["itlt".to_string()],
            apply_platform_denylist: cfg!(target_os = "macos"),
        }
    }
}
