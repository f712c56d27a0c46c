//! # Error Module
//!
//! Error types for the flat-field catalog.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, field names, what went wrong
//! - **No match is not an error** - searches return `Ok(None)`

use std::path::PathBuf;
use thiserror::Error;

/// Top-level library error
#[derive(Error, Debug)]
pub enum FlatFieldError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while listing a flat-field directory
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while reading shot metadata from a single file
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Unreadable metadata in {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Missing {field} in metadata of {path}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Invalid {field} ({value}) in metadata of {path}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        value: f64,
    },
}

impl MetadataError {
    /// Path of the file the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            MetadataError::Unreadable { path, .. }
            | MetadataError::MissingField { path, .. }
            | MetadataError::Invalid { path, .. } => path,
        }
    }
}

/// Errors in a search query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid {field} in query: {value} (must be a positive number)")]
    InvalidMetadata { field: &'static str, value: f64 },
}

/// Errors that occur while materializing a frame
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode raw file {path}: {reason}")]
    Failed { path: PathBuf, reason: String },

    #[error("Failed to open raw file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame {path} is {actual:?}, expected {expected:?} (width, height, channels)")]
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
}

/// Errors in the catalog's shared state
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog lock was poisoned by a panicking thread")]
    LockPoisoned,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, FlatFieldError>;
