//! In-memory catalog snapshot
//!
//! The catalog service publishes a periodic JSON snapshot of every entry it
//! knows about. Loading it once and indexing by slug and id keeps the bulk of
//! resolution entirely off the network.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::catalog::error::{CatalogError, Result};
use crate::catalog::{CatalogEntry, CatalogProvider};

/// Catalog backed by a fully loaded snapshot
#[derive(Debug)]
pub struct SnapshotCatalog {
    entries: Vec<CatalogEntry>,
    by_slug: HashMap<String, usize>,
    by_id: HashMap<u32, usize>,
}

impl SnapshotCatalog {
    /// Build a catalog from already-decoded entries
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut by_slug = HashMap::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            by_slug.entry(entry.slug.clone()).or_insert(index);
            by_id.entry(entry.id).or_insert(index);
        }
        Self {
            entries,
            by_slug,
            by_id,
        }
    }

    /// Decode a snapshot JSON document
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_slice(data).map_err(|source| CatalogError::Decode {
                url: "<snapshot>".to_string(),
                source,
            })?;
        debug!("Decoded catalog snapshot with {} entries", entries.len());
        Ok(Self::from_entries(entries))
    }

    /// Download and decode a snapshot from the distribution URL
    pub async fn download(client: &Client, url: &str) -> Result<Self> {
        info!("Reading catalog snapshot from {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|source| CatalogError::HttpRequest {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        if let Some(modified) = response.headers().get(reqwest::header::LAST_MODIFIED) {
            debug!("Catalog snapshot date is {:?}", modified);
        }
        let data = response
            .bytes()
            .await
            .map_err(|source| CatalogError::HttpRequest {
                url: url.to_string(),
                source,
            })?;
        let catalog = Self::from_json(&data)?;
        info!("Catalog snapshot holds {} entries", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CatalogProvider for SnapshotCatalog {
    async fn entry_by_id(&self, id: u32) -> Result<Option<CatalogEntry>> {
        Ok(self.by_id.get(&id).map(|&index| self.entries[index].clone()))
    }

    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        Ok(self
            .by_slug
            .get(slug)
            .map(|&index| self.entries[index].clone()))
    }

    async fn search(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        // A snapshot has nothing beyond its own index to fall back to.
        self.entry_by_slug(slug).await
    }
}
