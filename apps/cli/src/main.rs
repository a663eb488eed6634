//! packfetch command line interface
//!
//! Thin wrapper over the library: `resolve` turns a manifest into a
//! lockfile, `sync` reconciles a lockfile against the local cache and the
//! target directory.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use packfetch::catalog::http::DEFAULT_API_URL;
use packfetch::{
    HistoryStore, HttpCatalog, LayeredCatalog, LockfileStore, Manifest, ReleaseClient, Resolver,
    ResolverOptions, RunMode, SnapshotCatalog, SyncEngine, SyncOptions,
};

#[derive(Parser)]
#[command(name = "packfetch", version, about = "Modpack resolver and sync client")]
struct Cli {
    /// Increase output verbosity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a manifest into a lockfile
    Resolve(ResolveArgs),
    /// Reconcile a lockfile against the cache and target directories
    Sync(SyncArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Manifest location
    #[arg(short, long, default_value = "manifest.yml")]
    manifest: PathBuf,

    /// Lockfile output path
    #[arg(short, long, default_value = "manifest.lock")]
    lockfile: PathBuf,

    /// Pretty-printed lockfile companion
    #[arg(long, default_value = "manifest.json")]
    pretty: PathBuf,

    /// Catalog snapshot, a local file or an http(s) URL; omitting it falls
    /// back to per-mod API lookups
    #[arg(long)]
    catalog: Option<String>,

    /// Catalog API endpoint for fallback lookups
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Disable the fallback search; unresolved mods become fatal
    #[arg(long)]
    no_fallback: bool,

    /// Treat every soft resolution failure as fatal
    #[arg(long)]
    strict: bool,

    /// Bound on concurrent catalog lookups
    #[arg(long, default_value_t = 8)]
    jobs: usize,
}

#[derive(Args)]
struct SyncArgs {
    /// Releases API URL of the pack repository
    #[arg(short, long)]
    repo: Option<String>,

    /// Release to install when fetching from a repository
    #[arg(long, default_value = "latest")]
    release: String,

    /// Local lockfile path (bypasses the repository)
    #[arg(short, long)]
    lockfile: Option<PathBuf>,

    /// Game directory receiving mods/resourcepacks/config
    #[arg(long, default_value = ".minecraft")]
    minecraft_dir: PathBuf,

    /// Override the mods download directory
    #[arg(short, long)]
    download: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Skip server-only mods
    #[arg(short, long)]
    clientonly: bool,

    /// Skip client-only mods
    #[arg(short, long)]
    serveronly: bool,

    /// Test mode: transfer but do not save any files
    #[arg(short, long)]
    test: bool,

    /// Skip applying the bundled config archive
    #[arg(long)]
    no_config: bool,

    /// Delete files flagged as stale instead of only reporting them
    #[arg(long)]
    delete_stale: bool,

    /// Bound on concurrent downloads
    #[arg(long, default_value_t = 4)]
    jobs: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Resolve(args) => resolve(args).await,
        Command::Sync(args) => sync(args).await,
    }
}

async fn resolve(args: ResolveArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)
        .await
        .with_context(|| format!("loading manifest {}", args.manifest.display()))?;
    info!(
        "Resolving {} mods for {} / {}",
        manifest.entries.len(),
        manifest.config.version,
        manifest.config.mod_loader
    );

    let client = reqwest::Client::new();
    let snapshot = match &args.catalog {
        Some(location) if location.starts_with("http://") || location.starts_with("https://") => {
            SnapshotCatalog::download(&client, location).await?
        }
        Some(location) => {
            let data = tokio::fs::read(location)
                .await
                .with_context(|| format!("reading catalog snapshot {location}"))?;
            SnapshotCatalog::from_json(&data)?
        }
        None => {
            warn!("No catalog snapshot given; every mod resolves through the API");
            SnapshotCatalog::from_entries(Vec::new())
        }
    };
    let catalog = LayeredCatalog::new(
        snapshot,
        Some(HttpCatalog::new(client, args.api_url.clone()).with_max_in_flight(args.jobs)),
    );

    let resolver = Resolver::new(Arc::new(catalog), manifest.config.clone()).with_options(
        ResolverOptions {
            fallback_search: !args.no_fallback,
            strict: args.strict,
            concurrency: args.jobs,
        },
    );
    let resolution = resolver.resolve(&manifest.entries).await?;

    LockfileStore::new(&args.lockfile)
        .with_pretty_path(&args.pretty)
        .write(&resolution.mods)
        .await?;
    info!(
        "Resolved {} mods into {}",
        resolution.mods.len(),
        args.lockfile.display()
    );

    for slug in &resolution.report.left_behind {
        warn!("Left behind: {}", slug);
    }
    for slug in &resolution.report.unresolved_files {
        warn!("No compatible file: {}", slug);
    }
    if !resolution.report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

async fn sync(args: SyncArgs) -> Result<()> {
    let cache_root = args.cache.clone().unwrap_or_else(default_cache_root);

    // Either a repository release or a local lockfile supplies the mods.
    let (mods, version_id, config_archive) = if let Some(repo) = &args.repo {
        let releases = ReleaseClient::new(reqwest::Client::new(), repo.clone());
        let release = releases.fetch(&args.release).await?;
        let mods = LockfileStore::decode(&release.lockfile, Path::new(repo))?;
        (mods, release.version_id, release.config_archive)
    } else {
        let path = args
            .lockfile
            .clone()
            .unwrap_or_else(|| PathBuf::from("manifest.lock"));
        if !path.exists() {
            bail!("lockfile not found: {}", path.display());
        }
        info!("Using custom lockfile: {}", path.display());
        let mods = LockfileStore::new(&path).read().await?;
        (mods, "local".to_string(), None)
    };

    let mode = match (args.clientonly, args.serveronly) {
        (true, true) => bail!("--clientonly and --serveronly are mutually exclusive"),
        (true, false) => RunMode::ClientOnly,
        (false, true) => RunMode::ServerOnly,
        (false, false) => RunMode::Full,
    };

    let options = SyncOptions {
        mods_dir: args
            .download
            .clone()
            .unwrap_or_else(|| args.minecraft_dir.join("mods")),
        cache_dir: cache_root.join("mods"),
        resourcepack_dir: args.minecraft_dir.join("resourcepacks"),
        config_dir: args.minecraft_dir.join("config"),
        install_root: args
            .minecraft_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        mode,
        dry_run: args.test,
        delete_stale: args.delete_stale,
        download_concurrency: args.jobs,
        ..SyncOptions::default()
    };

    let history_store = HistoryStore::new(cache_root.join(".cached_mods.json"));
    let mut history = history_store.load().await?;

    let engine = SyncEngine::new(options)?;
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Canceling!");
            token.cancel();
        }
    });

    let summary = engine.sync(&mods, &version_id, &mut history).await?;

    if let Some(archive) = config_archive {
        if args.no_config {
            info!("Skipping config sync");
        } else if summary.cancelled {
            info!("Run was cancelled, leaving config untouched");
        } else {
            let report = engine.sync_config(archive).await?;
            info!(
                "Config sync: {} files copied, {} ignored",
                report.files_copied,
                report.ignored.len()
            );
        }
    }

    if !args.test && !summary.cancelled {
        history_store.save(&history).await?;
    }

    info!(
        "{} installed ({} from cache, {} copied, {} downloaded), {} skipped",
        summary.installed.len(),
        summary.cache_hits,
        summary.copied,
        summary.downloaded,
        summary.skipped.len()
    );
    for (name, error) in &summary.failed {
        warn!("Failed: {} ({})", name, error);
    }
    for filename in &summary.stale {
        warn!("Stale: {}", filename);
    }

    if !summary.is_success() {
        std::process::exit(1);
    }
    info!("We're done here.");
    Ok(())
}

fn default_cache_root() -> PathBuf {
    directories::ProjectDirs::from("", "", "packfetch")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".packfetch-cache"))
}
