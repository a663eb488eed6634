//! Error types for catalog access

use thiserror::Error;

/// Errors produced while querying a mod catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// HTTP-level failure talking to the catalog service
    #[error("catalog request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("catalog request to '{url}' returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body was not the JSON shape we expect
    #[error("malformed catalog response from '{url}'")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Check if the error is worth retrying at the request level
    pub fn is_recoverable(&self) -> bool {
        match self {
            CatalogError::HttpRequest { source, .. } => source
                .status()
                .map_or(true, |status| status.is_server_error() || status == 429),
            CatalogError::Status { status, .. } => {
                status.is_server_error() || *status == 429
            }
            CatalogError::Decode { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            CatalogError::HttpRequest { .. } => "http_request",
            CatalogError::Status { .. } => "status",
            CatalogError::Decode { .. } => "decode",
        }
    }
}
