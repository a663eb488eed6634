//! Remote pack releases
//!
//! Packs are distributed as releases of a repository: each release carries a
//! lockfile asset and, optionally, a bundled config archive. The release id
//! doubles as the version id recorded in install history.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Asset name of the lockfile inside a release
pub const LOCKFILE_ASSET: &str = "manifest.lock";
/// Asset name of the bundled config archive
pub const CONFIG_ASSET: &str = "config.zip";

/// Release selector meaning "newest available"
pub const LATEST: &str = "latest";

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("release request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("release request to '{url}' returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("no release matching '{selector}'")]
    NotFound { selector: String },

    #[error("release '{release}' has no '{asset}' asset")]
    MissingAsset { release: String, asset: String },
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
    name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

/// A fetched pack release, ready to hand to the sync engine
#[derive(Debug)]
pub struct PackRelease {
    /// Release id, used as the history version id
    pub version_id: String,
    pub lockfile: Vec<u8>,
    pub config_archive: Option<Vec<u8>>,
}

/// Client for a repository's releases API
pub struct ReleaseClient {
    client: Client,
    api_url: String,
}

impl ReleaseClient {
    /// `api_url` points at the repository's releases listing endpoint
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Fetch the release matching `selector` and download its known assets
    ///
    /// `latest` picks the newest release; anything else must match a release
    /// name exactly. The lockfile asset is required, the config archive is
    /// optional.
    pub async fn fetch(&self, selector: &str) -> Result<PackRelease> {
        let releases: Vec<Release> = self.get_json(&self.api_url).await?;
        debug!("Release listing holds {} entries", releases.len());

        let release = if selector == LATEST {
            releases.into_iter().next()
        } else {
            releases.into_iter().find(|r| r.name == selector)
        }
        .ok_or_else(|| ReleaseError::NotFound {
            selector: selector.to_string(),
        })?;
        info!("Using {} as the release selector", release.name);

        let lockfile_url = release
            .assets
            .iter()
            .find(|asset| asset.name == LOCKFILE_ASSET)
            .map(|asset| asset.browser_download_url.clone())
            .ok_or_else(|| ReleaseError::MissingAsset {
                release: release.name.clone(),
                asset: LOCKFILE_ASSET.to_string(),
            })?;
        let lockfile = self.get_bytes(&lockfile_url).await?;

        let config_archive = match release
            .assets
            .iter()
            .find(|asset| asset.name == CONFIG_ASSET)
        {
            Some(asset) => Some(self.get_bytes(&asset.browser_download_url).await?),
            None => None,
        };

        Ok(PackRelease {
            version_id: release.id.to_string(),
            lockfile,
            config_archive,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(url).await?;
        response
            .json()
            .await
            .map_err(|source| ReleaseError::HttpRequest {
                url: url.to_string(),
                source,
            })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        Ok(response
            .bytes()
            .await
            .map_err(|source| ReleaseError::HttpRequest {
                url: url.to_string(),
                source,
            })?
            .to_vec())
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ReleaseError::HttpRequest {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(ReleaseError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }
}
