//! In-memory lister for tests and embedding.

use super::{DirectoryLister, RawFile, RawFormat, ScanResult};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

/// Lister serving fixed file lists per directory.
///
/// Directories that were never registered behave like missing ones.
/// Listings can be replaced at any time to simulate filesystem changes.
#[derive(Default)]
pub struct FixedListing {
    directories: RwLock<HashMap<PathBuf, Vec<PathBuf>>>,
}

impl FixedListing {
    /// Create an empty lister
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory and its files
    pub fn with_directory(self, root: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        self.set_directory(root, files);
        self
    }

    /// Replace the files of a directory
    pub fn set_directory(&self, root: impl Into<PathBuf>, files: Vec<PathBuf>) {
        if let Ok(mut directories) = self.directories.write() {
            directories.insert(root.into(), files);
        }
    }

    /// Forget a directory so listing it fails
    pub fn remove_directory(&self, root: &Path) {
        if let Ok(mut directories) = self.directories.write() {
            directories.remove(root);
        }
    }
}

impl DirectoryLister for FixedListing {
    fn list_entries_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        let directories = self.directories.read().map_err(|_| ScanError::ReadDirectory {
            path: root.to_path_buf(),
            source: std::io::Error::other("listing lock poisoned"),
        })?;

        let paths = directories
            .get(root)
            .ok_or_else(|| ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            })?;

        events.send(Event::Scan(ScanEvent::Started {
            path: root.to_path_buf(),
        }));

        let mut files: Vec<RawFile> = paths
            .iter()
            .map(|path| RawFile {
                path: path.clone(),
                size: 0,
                modified: SystemTime::UNIX_EPOCH,
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(RawFormat::from_extension)
                    .unwrap_or(RawFormat::Unknown),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: files.len(),
        }));

        Ok(ScanResult {
            files,
            errors: Vec::new(),
        })
    }
}
