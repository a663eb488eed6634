//! Bundled configuration sync
//!
//! Packs ship a config archive next to their lockfile. It is extracted into
//! a staging directory, entries listed in the archive's ignore file are
//! dropped, and the remainder is copied over the live config directory. A
//! companion descriptor file, when bundled, lands in the install root.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::sync::error::{FileOperation, Result, SyncError};

/// Paths listed here are removed from staging before the copy
pub const IGNORE_FILE: &str = ".configignore";
/// Copied into the install root when the archive bundles one
pub const DESCRIPTOR_FILE: &str = "mmc-pack.json";

/// What a config sync ended up doing
#[derive(Debug, Default)]
pub struct ConfigSyncReport {
    pub files_copied: usize,
    pub ignored: Vec<String>,
    pub descriptor_copied: bool,
}

fn fs_error(path: &Path, operation: FileOperation) -> impl FnOnce(std::io::Error) -> SyncError + '_ {
    move |source| SyncError::FileSystem {
        path: path.to_path_buf(),
        operation,
        source,
    }
}

/// Extract, filter, and apply a bundled config archive
///
/// Runs on the blocking pool; archive decoding and the tree copy are
/// synchronous work.
pub async fn sync_config_archive(
    archive: Vec<u8>,
    staging_dir: PathBuf,
    config_dir: PathBuf,
    install_root: PathBuf,
) -> Result<ConfigSyncReport> {
    tokio::task::spawn_blocking(move || {
        apply_archive(&archive, &staging_dir, &config_dir, &install_root)
    })
    .await
    .expect("config sync task panicked")
}

fn apply_archive(
    archive: &[u8],
    staging_dir: &Path,
    config_dir: &Path,
    install_root: &Path,
) -> Result<ConfigSyncReport> {
    info!("Updating config...");
    let mut report = ConfigSyncReport::default();

    std::fs::create_dir_all(staging_dir)
        .map_err(fs_error(staging_dir, FileOperation::CreateDir))?;
    extract_zip(archive, staging_dir)?;

    // Apply the archive's ignore list before anything reaches the live dir.
    let ignore_path = staging_dir.join(IGNORE_FILE);
    if ignore_path.is_file() {
        let listed =
            std::fs::read_to_string(&ignore_path).map_err(fs_error(&ignore_path, FileOperation::Read))?;
        info!("Checking for ignored configs...");
        for line in listed.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let victim = staging_dir.join(line);
            if victim.exists() {
                info!("Ignoring {}...", line);
                if victim.is_dir() {
                    std::fs::remove_dir_all(&victim)
                        .map_err(fs_error(&victim, FileOperation::Delete))?;
                } else {
                    std::fs::remove_file(&victim)
                        .map_err(fs_error(&victim, FileOperation::Delete))?;
                }
                report.ignored.push(line.to_string());
            }
        }
    }

    info!("Copying new config to directory...");
    report.files_copied = copy_tree(staging_dir, config_dir)?;

    let descriptor = staging_dir.join(DESCRIPTOR_FILE);
    if descriptor.is_file() {
        info!("Copying pack descriptor...");
        let dest = install_root.join(DESCRIPTOR_FILE);
        std::fs::copy(&descriptor, &dest).map_err(fs_error(&dest, FileOperation::Copy))?;
        report.descriptor_copied = true;
    }

    Ok(report)
}

fn extract_zip(archive: &[u8], dest_dir: &Path) -> Result<()> {
    debug!("Extracting config archive to {}", dest_dir.display());
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            // Entries escaping the staging dir are silently dropped.
            None => continue,
        };
        let out_path = dest_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(fs_error(&out_path, FileOperation::CreateDir))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(fs_error(parent, FileOperation::CreateDir))?;
        }
        let mut out =
            std::fs::File::create(&out_path).map_err(fs_error(&out_path, FileOperation::Create))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(fs_error(&out_path, FileOperation::Read))?;
        out.write_all(&data)
            .map_err(fs_error(&out_path, FileOperation::Write))?;
    }
    Ok(())
}

/// Copy a directory tree, merging into existing directories
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    std::fs::create_dir_all(to).map_err(fs_error(to, FileOperation::CreateDir))?;
    let mut copied = 0;
    let entries = std::fs::read_dir(from).map_err(fs_error(from, FileOperation::Read))?;
    for entry in entries {
        let entry = entry.map_err(fs_error(from, FileOperation::Read))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());
        if source.is_dir() {
            copied += copy_tree(&source, &dest)?;
        } else {
            std::fs::copy(&source, &dest).map_err(fs_error(&dest, FileOperation::Copy))?;
            copied += 1;
        }
    }
    Ok(copied)
}
