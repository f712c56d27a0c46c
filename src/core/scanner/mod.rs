//! # Scanner Module
//!
//! Lists the raw files of a flat-field directory.
//!
//! ## Supported Formats
//! - Canon (.cr2, .cr3, .crw)
//! - Nikon (.nef, .nrw)
//! - Sony (.arw, .sr2, .srf)
//! - Fujifilm (.raf)
//! - Olympus (.orf)
//! - Panasonic (.rw2)
//! - Pentax (.pef)
//! - Samsung (.srw)
//! - Adobe DNG (.dng)
//!
//! ## Example
//! ```rust,ignore
//! use flatfield_catalog::core::scanner::{DirectoryLister, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let listing = scanner.list_entries(Path::new("/flats"))?;
//! ```

mod filter;
mod memory;
mod walker;

pub use filter::RawFilter;
pub use memory::FixedListing;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::{null_sender, EventSender};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A raw file discovered in a flat-field directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFile {
    /// Path to the raw file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Raw container detected from the extension
    pub format: RawFormat,
}

/// Raw containers recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawFormat {
    Cr2,
    Cr3,
    Crw,
    Nef,
    Nrw,
    Arw,
    Sr2,
    Srf,
    Raf,
    Orf,
    Rw2,
    Pef,
    Srw,
    Dng,
    Unknown,
}

impl RawFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "cr2" => RawFormat::Cr2,
            "cr3" => RawFormat::Cr3,
            "crw" => RawFormat::Crw,
            "nef" => RawFormat::Nef,
            "nrw" => RawFormat::Nrw,
            "arw" => RawFormat::Arw,
            "sr2" => RawFormat::Sr2,
            "srf" => RawFormat::Srf,
            "raf" => RawFormat::Raf,
            "orf" => RawFormat::Orf,
            "rw2" => RawFormat::Rw2,
            "pef" => RawFormat::Pef,
            "srw" => RawFormat::Srw,
            "dng" => RawFormat::Dng,
            _ => RawFormat::Unknown,
        }
    }

    /// Lowercase extensions of every supported format
    pub fn default_extensions() -> &'static [&'static str] {
        &[
            "cr2", "cr3", "crw", "nef", "nrw", "arw", "sr2", "srf", "raf", "orf", "rw2", "pef",
            "srw", "dng",
        ]
    }
}

/// Result of listing one directory
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Raw files found, sorted by path
    pub files: Vec<RawFile>,
    /// Errors on individual entries (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Source of the files that make up a flat-field directory.
///
/// A missing or unreadable root is an `Err`; problems with single entries
/// are collected in `ScanResult::errors`.
pub trait DirectoryLister: Send + Sync {
    /// List the raw files under `root`
    fn list_entries(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.list_entries_with_events(root, &null_sender())
    }

    /// List with progress reporting via events
    fn list_entries_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError>;
}
