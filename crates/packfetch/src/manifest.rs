//! Manifest parsing
//!
//! The manifest is the human-authored declaration of a modpack: the target
//! game version, the mod loader, and a list of mod slugs with optional
//! per-mod settings. Absent-vs-object YAML values are modeled explicitly as
//! [`ManifestRequest`] instead of being probed attribute by attribute.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::ModLoader;

/// Global target the whole pack resolves against
#[derive(Debug, Clone)]
pub struct ModpackConfig {
    /// Target game version string, e.g. "1.16.5"
    pub version: String,
    /// Target loader; manifests only ever declare forge or fabric
    pub mod_loader: ModLoader,
}

/// Per-mod settings a manifest entry may carry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntryOptions {
    /// Direct download URL, bypassing catalog resolution entirely
    #[serde(default)]
    pub url: Option<String>,
    /// Explicit catalog id; the fetched entry's slug must match the key
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "clientonly")]
    pub client_only: bool,
    #[serde(default, rename = "serveronly")]
    pub server_only: bool,
    /// Route to the resource pack directory instead of the mods pipeline
    #[serde(default)]
    pub resourcepack: bool,
}

/// What a manifest entry asks for
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestRequest {
    /// Bare slug, resolve purely by catalog lookup
    Plain,
    /// Slug plus an options object
    WithOptions(EntryOptions),
}

/// One desired mod
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Mod slug, the manifest's unique key
    pub key: String,
    pub request: ManifestRequest,
}

impl ManifestEntry {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            request: ManifestRequest::Plain,
        }
    }

    pub fn with_options(key: impl Into<String>, options: EntryOptions) -> Self {
        Self {
            key: key.into(),
            request: ManifestRequest::WithOptions(options),
        }
    }

    /// Effective options (defaults for plain entries)
    pub fn options(&self) -> EntryOptions {
        match &self.request {
            ManifestRequest::Plain => EntryOptions::default(),
            ManifestRequest::WithOptions(options) => options.clone(),
        }
    }
}

/// A parsed manifest: global target plus desired mods in authored order
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: ModpackConfig,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("unknown mod loader '{value}' (expected forge or fabric)")]
    UnknownLoader { value: String },

    #[error("manifest entry {index} is not a 'slug:' or 'slug: {{options}}' mapping")]
    InvalidEntry { index: usize },
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: String,
    modloader: String,
    #[serde(default)]
    mods: Vec<serde_yaml_ng::Mapping>,
}

impl Manifest {
    /// Parse manifest YAML
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_yaml_ng::from_str(text)?;

        let mod_loader = ModLoader::from_name(&raw.modloader).ok_or_else(|| {
            ManifestError::UnknownLoader {
                value: raw.modloader.clone(),
            }
        })?;

        let mut entries = Vec::new();
        for (index, mapping) in raw.mods.iter().enumerate() {
            for (key, value) in mapping {
                let key = key
                    .as_str()
                    .ok_or(ManifestError::InvalidEntry { index })?
                    .to_string();
                let request = match value {
                    serde_yaml_ng::Value::Null => ManifestRequest::Plain,
                    value => ManifestRequest::WithOptions(serde_yaml_ng::from_value(
                        value.clone(),
                    )?),
                };
                entries.push(ManifestEntry { key, request });
            }
        }

        Ok(Self {
            config: ModpackConfig {
                version: raw.version,
                mod_loader,
            },
            entries,
        })
    }

    /// Load and parse a manifest file
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
version: 1.16.5
modloader: forge
mods:
  - jei:
  - optifine:
      url: https://host.invalid/get?version=OptiFine_1.16.5.jar
      optional: true
      clientonly: true
  - cofh-core:
      id: 69162
"#;

    #[test]
    fn parses_plain_and_option_entries_in_order() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.config.version, "1.16.5");
        assert_eq!(manifest.config.mod_loader, ModLoader::Forge);

        let keys: Vec<&str> = manifest.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["jei", "optifine", "cofh-core"]);

        assert_eq!(manifest.entries[0].request, ManifestRequest::Plain);

        let optifine = manifest.entries[1].options();
        assert!(optifine.optional);
        assert!(optifine.client_only);
        assert!(!optifine.server_only);
        assert_eq!(
            optifine.url.as_deref(),
            Some("https://host.invalid/get?version=OptiFine_1.16.5.jar")
        );

        assert_eq!(manifest.entries[2].options().id, Some(69162));
    }

    #[test]
    fn rejects_unknown_loader() {
        let err = Manifest::parse("version: 1.16.5\nmodloader: quilt\nmods: []").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownLoader { .. }));
    }

    #[test]
    fn duplicate_keys_survive_parsing_for_the_resolver_to_reject() {
        let manifest =
            Manifest::parse("version: 1.12.2\nmodloader: fabric\nmods:\n  - jei:\n  - jei:\n")
                .unwrap();
        assert_eq!(manifest.entries.len(), 2);
    }
}
