//! Error types for manifest resolution

use thiserror::Error;

use crate::catalog::CatalogError;

/// Fatal resolution errors
///
/// Soft failures (a single mod not found, no compatible file in default
/// mode) never show up here; they are collected into the resolve report and
/// the run continues. These variants abort the run: the first two are
/// manifest defects caught before any fan-out starts, the rest are strict
/// mode promotions or pre-flight transport failures.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("duplicate manifest keys: {}", keys.join(", "))]
    DuplicateKeys { keys: Vec<String> },

    #[error(
        "mod mismatch: manifest says '{expected}' but catalog id {id} is '{found}' \
         (wrong mod id in the manifest?)"
    )]
    SlugMismatch {
        expected: String,
        found: String,
        id: u32,
    },

    #[error("explicit id {id} for '{slug}' does not exist in the catalog")]
    UnknownId { id: u32, slug: String },

    #[error("'{slug}' was not found in the catalog")]
    NotFound { slug: String },

    #[error("'{slug}' has no compatible file for {version}")]
    NoCompatibleFile { slug: String, version: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
