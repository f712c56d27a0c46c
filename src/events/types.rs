//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted while building and querying the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Directory listing events
    Scan(ScanEvent),
    /// Catalog population and lifecycle events
    Catalog(CatalogEvent),
}

/// Events during directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Listing has started
    Started { path: PathBuf },
    /// Progress update during listing
    Progress(ScanProgress),
    /// A raw file was found
    FileFound { path: PathBuf },
    /// An error occurred but listing continues
    Error { path: PathBuf, message: String },
    /// Listing completed
    Completed { total_files: usize },
}

/// Progress information during listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories visited so far
    pub directories_scanned: usize,
    /// Number of raw files found so far
    pub files_found: usize,
    /// Current directory being visited
    pub current_path: PathBuf,
}

/// Events while (re)building the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogEvent {
    /// Population of a directory has started
    Started { path: PathBuf },
    /// A file became a new catalog entry
    FileIndexed { path: PathBuf, key: String },
    /// A file joined an existing entry as an averaging sibling
    SiblingGrouped { path: PathBuf, primary: PathBuf },
    /// A file was skipped because its metadata could not be used
    FileSkipped { path: PathBuf, message: String },
    /// Population finished and the new catalog is live
    Completed(CatalogSummary),
    /// `initialize` was called with the already indexed directory
    Unchanged { path: PathBuf },
    /// The catalog was emptied
    Cleared,
}

/// Summary of a finished population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Directory that was indexed
    pub path: PathBuf,
    /// Number of distinct entries
    pub entry_count: usize,
    /// Number of files including siblings
    pub file_count: usize,
    /// Number of files skipped for unusable metadata
    pub skipped: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}
