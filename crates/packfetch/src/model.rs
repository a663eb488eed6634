//! Resolved-set and history data model
//!
//! These are the wire types shared by the resolver, the lockfile store, and
//! the sync engine. Field names follow the lockfile format consumed by
//! existing packs, so serde renames are load-bearing here.

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, CatalogFile};
use crate::manifest::EntryOptions;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One concrete artifact in the resolved set
///
/// Created during resolution and never mutated afterwards; the sync engine
/// only reads it. `id` stays null for custom-URL mods the catalog has never
/// seen, and `download_url`/`filename` stay null when no compatible file
/// exists for the target version (the mod is carried in the lockfile but
/// cannot be scheduled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMod {
    pub id: Option<u32>,
    pub slug: String,
    pub name: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
    pub filename: Option<String>,
    /// Remote-reported byte length, the verification ground truth
    #[serde(rename = "fileLength", default, skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
    #[serde(rename = "clientonly", default)]
    pub client_only: bool,
    #[serde(rename = "serveronly", default)]
    pub server_only: bool,
    #[serde(default)]
    pub optional: bool,
    /// Sourced from an explicit URL override, bypassing catalog matching
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub resourcepack: bool,
}

impl ResolvedMod {
    /// Build from a catalog entry and its selected file
    pub(crate) fn from_catalog(
        entry: &CatalogEntry,
        file: &CatalogFile,
        options: &EntryOptions,
    ) -> Self {
        Self {
            id: Some(entry.id),
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            download_url: Some(file.download_url.clone()),
            filename: Some(file.file_name.clone()),
            file_length: file.file_length,
            client_only: options.client_only,
            server_only: options.server_only,
            optional: options.optional,
            custom: false,
            resourcepack: options.resourcepack,
        }
    }

    /// Build from a catalog entry that has no compatible file
    pub(crate) fn without_file(entry: &CatalogEntry, options: &EntryOptions) -> Self {
        Self {
            id: Some(entry.id),
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            download_url: None,
            filename: None,
            file_length: None,
            client_only: options.client_only,
            server_only: options.server_only,
            optional: options.optional,
            custom: false,
            resourcepack: options.resourcepack,
        }
    }

    /// Build a transitively required dependency (no manifest-level flags)
    pub(crate) fn dependency(entry: &CatalogEntry, file: &CatalogFile) -> Self {
        Self::from_catalog(entry, file, &EntryOptions::default())
    }

    /// Build from an explicit URL override
    ///
    /// `identity` carries the catalog id and display name when the slug was
    /// found in the catalog; download data always comes from the custom URL.
    pub(crate) fn custom(
        key: &str,
        url: &str,
        filename: String,
        identity: Option<(u32, String)>,
        options: &EntryOptions,
    ) -> Self {
        let (id, name) = match identity {
            Some((id, name)) => (Some(id), name),
            None => (None, key.to_string()),
        };
        Self {
            id,
            slug: key.to_string(),
            name,
            download_url: Some(url.to_string()),
            filename: Some(filename),
            file_length: None,
            client_only: options.client_only,
            server_only: options.server_only,
            optional: options.optional,
            custom: true,
            resourcepack: options.resourcepack,
        }
    }
}

/// One run's installed-file record
///
/// History is an append-only list of these, persisted between runs; the
/// previous record for the same version id is what stale-file detection
/// diffs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "id")]
    pub version_id: String,
    #[serde(rename = "mods")]
    pub filenames: Vec<String>,
}
