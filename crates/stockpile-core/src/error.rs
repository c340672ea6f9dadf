//! Error types for stockpile-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stockpile-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV error from the csv crate
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Resolution action outside replace / skip / rename
    #[error("invalid resolution action '{0}', expected one of: replace, skip, rename")]
    InvalidAction(String),

    /// Configuration rejected during validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A record store failed to read or replace its records
    #[error("record store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
