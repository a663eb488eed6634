//! Live catalog service client
//!
//! Used for the lookups a snapshot cannot answer: explicit-id fetches for
//! mods the snapshot never indexed and the fallback search that keeps a
//! misspelled or freshly published mod from being left behind.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::catalog::error::{CatalogError, Result};
use crate::catalog::{CatalogEntry, CatalogProvider};

/// Default public catalog API endpoint
pub const DEFAULT_API_URL: &str = "https://addons-ecs.forgesvc.net/api/v2/addon/";

// Query parameters pinning the search to the Minecraft mods section.
const SEARCH_GAME_ID: u32 = 432;
const SEARCH_SECTION_ID: u32 = 6;

/// HTTP client for the catalog service
///
/// In-flight requests are bounded by a semaphore so dependency expansion
/// cannot fan out into an unbounded burst against the remote service, and
/// transport failures are retried a bounded number of times with exponential
/// backoff before they surface.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    permits: Semaphore,
    max_retries: usize,
    retry_delay: Duration,
}

impl HttpCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            permits: Semaphore::new(8),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Bound the number of concurrent catalog requests
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.permits = Semaphore::new(max_in_flight.max(1));
        self
    }

    /// Override the request-level retry budget
    pub fn with_retries(mut self, max_retries: usize, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let _permit = self.permits.acquire().await.expect("semaphore closed");

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay * (1 << (attempt - 1).min(5)) as u32;
                debug!("Retry {} for {} after {:?}", attempt, url, delay);
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(url).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_recoverable() {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.expect("at least one attempt"))
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
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
        let body = response
            .bytes()
            .await
            .map_err(|source| CatalogError::HttpRequest {
                url: url.to_string(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|source| CatalogError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalog {
    async fn entry_by_id(&self, id: u32) -> Result<Option<CatalogEntry>> {
        let url = format!("{}{}", self.base_url, id);
        match self.get_json::<CatalogEntry>(&url).await {
            Ok(entry) => Ok(Some(entry)),
            Err(CatalogError::Status { status, .. }) if status == 404 => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn entry_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        // The service has no direct slug endpoint; search covers it.
        self.search(slug).await
    }

    async fn search(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        let url = format!(
            "{}search?gameId={}&sectionId={}&searchfilter={}",
            self.base_url, SEARCH_GAME_ID, SEARCH_SECTION_ID, slug
        );
        let candidates: Vec<CatalogEntry> = self.get_json(&url).await?;
        for candidate in candidates {
            if candidate.slug == slug {
                info!(
                    "Found {} via catalog search [{}] [{}]",
                    slug, candidate.name, candidate.id
                );
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
