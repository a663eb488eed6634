//! Error types for the sync engine

use std::path::PathBuf;
use thiserror::Error;

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Copy,
    Metadata,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Copy => write!(f, "copying"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

/// Errors produced while reconciling a resolved set against disk
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to construct HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("download of '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of '{url}' returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("file operation failed while {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "size mismatch for '{file}': expected {expected} bytes, got {actual} \
         ({diff} byte difference)"
    )]
    SizeMismatch {
        file: PathBuf,
        expected: u64,
        actual: u64,
        diff: i64,
    },

    #[error("giving up on '{name}' after {attempts} verification attempts: {last_error}")]
    MaxRetriesExceeded {
        name: String,
        attempts: usize,
        last_error: String,
    },

    #[error("download of '{name}' cancelled")]
    Cancelled { name: String },

    #[error("config archive error")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Check if the error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::HttpRequest { source, .. } => source
                .status()
                .map_or(true, |status| status.is_server_error() || status == 429),
            SyncError::Status { status, .. } => status.is_server_error() || *status == 429,
            SyncError::SizeMismatch { .. } => true,
            SyncError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            SyncError::Client { .. }
            | SyncError::MaxRetriesExceeded { .. }
            | SyncError::Cancelled { .. }
            | SyncError::Archive(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::Client { .. } => "client",
            SyncError::HttpRequest { .. } => "http_request",
            SyncError::Status { .. } => "status",
            SyncError::FileSystem { .. } => "file_system",
            SyncError::SizeMismatch { .. } => "size_mismatch",
            SyncError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            SyncError::Cancelled { .. } => "cancelled",
            SyncError::Archive(_) => "archive",
        }
    }
}
