//! End-to-end tests against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::catalog::{HttpCatalog, LayeredCatalog, SnapshotCatalog};
use crate::manifest::{EntryOptions, ManifestEntry, ModpackConfig};
use crate::model::{HistoryRecord, ResolvedMod};
use crate::release::ReleaseClient;
use crate::resolve::Resolver;
use crate::sync::{RunMode, SyncEngine, SyncOptions};
use crate::ModLoader;

struct Sandbox {
    _dir: TempDir,
    options: SyncOptions,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let options = SyncOptions {
            mods_dir: dir.path().join("mods"),
            cache_dir: dir.path().join("cache"),
            resourcepack_dir: dir.path().join("resourcepacks"),
            config_dir: dir.path().join("config"),
            install_root: dir.path().to_path_buf(),
            mode: RunMode::Full,
            dry_run: false,
            delete_stale: false,
            download_concurrency: 4,
            verify_retries: 2,
            retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(50),
            request_timeout: Duration::from_secs(5),
            apply_platform_denylist: false,
            ..SyncOptions::default()
        };
        Self { _dir: dir, options }
    }

    fn seed_cache(&self, filename: &str, data: &[u8]) {
        std::fs::create_dir_all(&self.options.cache_dir).unwrap();
        std::fs::write(self.options.cache_dir.join(filename), data).unwrap();
    }

    fn seed_target(&self, filename: &str, data: &[u8]) {
        std::fs::create_dir_all(&self.options.mods_dir).unwrap();
        std::fs::write(self.options.mods_dir.join(filename), data).unwrap();
    }

    fn cache_file(&self, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.options.cache_dir.join(filename)).ok()
    }

    fn target_file(&self, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.options.mods_dir.join(filename)).ok()
    }
}

fn resolved(name: &str, url: String, length: u64) -> ResolvedMod {
    ResolvedMod {
        id: Some(1),
        slug: name.to_string(),
        name: name.to_string(),
        download_url: Some(url),
        filename: Some(format!("{name}.jar")),
        file_length: Some(length),
        client_only: false,
        server_only: false,
        optional: false,
        custom: false,
        resourcepack: false,
    }
}

#[tokio::test]
async fn download_writes_both_tiers_and_records_history() {
    let server = MockServer::start().await;
    let payload = b"jar bytes".to_vec();
    Mock::given(method("GET"))
        .and(path("/mods/alpha.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "alpha",
        format!("{}/mods/alpha.jar", server.uri()),
        payload.len() as u64,
    )];

    let mut history = Vec::new();
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.installed, vec!["alpha.jar".to_string()]);
    assert_eq!(sandbox.cache_file("alpha.jar").unwrap(), payload);
    assert_eq!(sandbox.target_file("alpha.jar").unwrap(), payload);

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version_id, "release-1");
    assert_eq!(history[0].filenames, vec!["alpha.jar".to_string()]);
}

#[tokio::test]
async fn verified_files_make_zero_network_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    let payload = b"already here";
    sandbox.seed_cache("alpha.jar", payload);
    sandbox.seed_target("alpha.jar", payload);

    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "alpha",
        format!("{}/mods/alpha.jar", server.uri()),
        payload.len() as u64,
    )];

    let mut history = Vec::new();
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.installed, vec!["alpha.jar".to_string()]);
}

#[tokio::test]
async fn verified_cache_is_copied_not_redownloaded() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    let payload = b"cached payload";
    sandbox.seed_cache("alpha.jar", payload);

    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "alpha",
        format!("{}/mods/alpha.jar", server.uri()),
        payload.len() as u64,
    )];

    let mut history = Vec::new();
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(sandbox.target_file("alpha.jar").unwrap(), payload);
}

#[tokio::test]
async fn persistent_length_mismatch_exhausts_retries() {
    let server = MockServer::start().await;
    // Body is always shorter than the expected length.
    Mock::given(method("GET"))
        .and(path("/mods/alpha.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"short".to_vec()))
        .expect(3) // initial attempt + verify_retries
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "alpha",
        format!("{}/mods/alpha.jar", server.uri()),
        9999,
    )];

    let mut history = Vec::new();
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("verification attempts"));
    assert!(summary.installed.is_empty());
    // The failed mod never enters history.
    assert_eq!(history.len(), 1);
    assert!(history[0].filenames.is_empty());
}

#[tokio::test]
async fn cancellation_cleans_in_flight_task_and_keeps_finished_ones() {
    let server = MockServer::start().await;
    let quick = b"quick payload".to_vec();
    Mock::given(method("GET"))
        .and(path("/mods/quick.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(quick.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mods/slow.jar"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1 << 20])
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    let options = sandbox.options.clone();
    let engine = SyncEngine::new(options).unwrap();
    let token = engine.cancellation_token();

    // Sorted by length descending the slow 1MiB transfer dispatches first,
    // but both run concurrently.
    let mods = vec![
        resolved("quick", format!("{}/mods/quick.jar", server.uri()), quick.len() as u64),
        resolved("slow", format!("{}/mods/slow.jar", server.uri()), 1 << 20),
    ];

    let task = tokio::spawn(async move {
        let mut history = Vec::new();
        let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();
        (summary, history)
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    token.cancel();
    let (summary, history) = task.await.unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    // The interrupted mod left nothing behind at either tier.
    assert!(sandbox.cache_file("slow.jar").is_none());
    assert!(sandbox.target_file("slow.jar").is_none());
    // The finished mod stays installed.
    assert_eq!(sandbox.cache_file("quick.jar").unwrap(), quick);
    assert_eq!(sandbox.target_file("quick.jar").unwrap(), quick);
    // Nothing is recorded for a cancelled run.
    assert!(history.is_empty());
}

#[tokio::test]
async fn dry_run_transfers_but_writes_nothing() {
    let server = MockServer::start().await;
    let payload = b"dry run payload".to_vec();
    Mock::given(method("GET"))
        .and(path("/mods/alpha.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let mut sandbox = Sandbox::new();
    sandbox.options.dry_run = true;
    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "alpha",
        format!("{}/mods/alpha.jar", server.uri()),
        payload.len() as u64,
    )];

    let mut history = Vec::new();
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.downloaded, 1);
    assert!(sandbox.cache_file("alpha.jar").is_none());
    assert!(sandbox.target_file("alpha.jar").is_none());
    assert!(history.is_empty());
}

#[tokio::test]
async fn stale_files_are_flagged_and_optionally_deleted() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut sandbox = Sandbox::new();
    sandbox.options.delete_stale = true;
    let payload = b"kept";
    sandbox.seed_cache("kept.jar", payload);
    sandbox.seed_target("kept.jar", payload);
    sandbox.seed_target("orphan.jar", b"left over from last release");

    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();
    let mods = vec![resolved(
        "kept",
        format!("{}/mods/kept.jar", server.uri()),
        payload.len() as u64,
    )];

    let mut history = vec![HistoryRecord {
        version_id: "release-1".to_string(),
        filenames: vec!["kept.jar".to_string(), "orphan.jar".to_string()],
    }];
    let summary = engine.sync(&mods, "release-1", &mut history).await.unwrap();

    assert_eq!(summary.stale, vec!["orphan.jar".to_string()]);
    assert!(sandbox.target_file("orphan.jar").is_none());
    // Prior records are retained, the new one is appended.
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].filenames, vec!["kept.jar".to_string()]);
}

#[tokio::test]
async fn mode_filtering_skips_conflicting_mods() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut sandbox = Sandbox::new();
    sandbox.options.mode = RunMode::ClientOnly;
    let engine = SyncEngine::new(sandbox.options.clone()).unwrap();

    let mut server_side = resolved("backend", format!("{}/mods/backend.jar", server.uri()), 4);
    server_side.server_only = true;

    let mut history = Vec::new();
    let summary = engine
        .sync(&[server_side], "release-1", &mut history)
        .await
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.installed.is_empty());
}

fn catalog_entry_json(id: u32, slug: &str, filename: &str, url: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "slug": slug,
        "name": slug,
        "summary": "",
        "latest_files": [{
            "gameVersion": ["1.16.5"],
            "modLoader": 1,
            "projectFileId": 100,
            "fileDate": "2021-03-01T10:00:00Z",
            "downloadUrl": url,
            "fileName": filename,
            "fileLength": 12,
            "dependencies": []
        }]
    })
}

fn forge_config() -> ModpackConfig {
    ModpackConfig {
        version: "1.16.5".to_string(),
        mod_loader: ModLoader::Forge,
    }
}

#[tokio::test]
async fn fallback_search_rescues_mods_missing_from_the_snapshot() {
    let server = MockServer::start().await;
    let base = format!("{}/api/addon/", server.uri());
    Mock::given(method("GET"))
        .and(path("/api/addon/search"))
        .and(query_param("searchfilter", "ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            catalog_entry_json(41, "ghost", "ghost.jar", "https://cdn.invalid/ghost.jar"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = LayeredCatalog::new(
        SnapshotCatalog::from_entries(Vec::new()),
        Some(HttpCatalog::new(reqwest::Client::new(), base)),
    );
    let resolver = Resolver::new(Arc::new(catalog), forge_config());

    let resolution = resolver
        .resolve(&[ManifestEntry::plain("ghost")])
        .await
        .unwrap();

    assert!(resolution.report.is_clean());
    assert_eq!(resolution.mods.len(), 1);
    assert_eq!(resolution.mods[0].id, Some(41));
    assert_eq!(resolution.mods[0].filename.as_deref(), Some("ghost.jar"));
}

#[tokio::test]
async fn explicit_id_fetches_through_the_live_api() {
    let server = MockServer::start().await;
    let base = format!("{}/api/addon/", server.uri());
    // By-id lookups answer with the live API's field naming.
    let mut entry = catalog_entry_json(77, "exact", "exact.jar", "https://cdn.invalid/exact.jar");
    let files = entry.as_object_mut().unwrap().remove("latest_files").unwrap();
    entry.as_object_mut().unwrap().insert("gameVersionLatestFiles".to_string(), files);

    Mock::given(method("GET"))
        .and(path("/api/addon/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entry))
        .mount(&server)
        .await;

    let catalog = LayeredCatalog::new(
        SnapshotCatalog::from_entries(Vec::new()),
        Some(HttpCatalog::new(reqwest::Client::new(), base)),
    );
    let resolver = Resolver::new(Arc::new(catalog), forge_config());

    let resolution = resolver
        .resolve(&[ManifestEntry::with_options(
            "exact",
            EntryOptions {
                id: Some(77),
                ..EntryOptions::default()
            },
        )])
        .await
        .unwrap();

    assert_eq!(resolution.mods.len(), 1);
    assert_eq!(resolution.mods[0].id, Some(77));
}

#[tokio::test]
async fn release_client_fetches_lockfile_and_config_assets() {
    let server = MockServer::start().await;
    let lockfile_body = b"[]".to_vec();
    let config_body = b"zip bytes".to_vec();

    Mock::given(method("GET"))
        .and(path("/api/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 9001,
                "name": "v2",
                "assets": [
                    {"name": "manifest.lock", "browser_download_url": format!("{}/dl/manifest.lock", server.uri())},
                    {"name": "config.zip", "browser_download_url": format!("{}/dl/config.zip", server.uri())}
                ]
            },
            {"id": 9000, "name": "v1", "assets": []}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/manifest.lock"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(lockfile_body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/config.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(config_body.clone()))
        .mount(&server)
        .await;

    let client = ReleaseClient::new(
        reqwest::Client::new(),
        format!("{}/api/releases", server.uri()),
    );

    // "latest" picks the newest release in the listing.
    let release = client.fetch("latest").await.unwrap();
    assert_eq!(release.version_id, "9001");
    assert_eq!(release.lockfile, lockfile_body);
    assert_eq!(release.config_archive.unwrap(), config_body);

    // Named selectors must match exactly; v1 has no lockfile asset.
    let err = client.fetch("v1").await.unwrap_err();
    assert!(err.to_string().contains("manifest.lock"));
}
