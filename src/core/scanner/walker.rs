//! Directory listing implementation using walkdir.

use super::filter::{is_hidden, RawFilter};
use super::{DirectoryLister, RawFile, ScanResult};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited, 1 = top level only)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = all supported raw formats)
    pub extensions: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: Some(1),
            extensions: None,
        }
    }
}

/// Lister backed by the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: RawFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = RawFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    fn walk_error(&self, err: walkdir::Error, root: &Path) -> ScanError {
        let path = err
            .path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.to_path_buf());

        if err.io_error().map(|e| e.kind()) == Some(std::io::ErrorKind::PermissionDenied) {
            ScanError::PermissionDenied { path }
        } else {
            ScanError::ReadDirectory {
                path,
                source: std::io::Error::other(err.to_string()),
            }
        }
    }
}

impl Default for WalkDirScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl DirectoryLister for WalkDirScanner {
    fn list_entries_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        // The root itself must be readable, otherwise the whole scan fails.
        if let Err(e) = fs::read_dir(root) {
            return Err(if e.kind() == std::io::ErrorKind::PermissionDenied {
                ScanError::PermissionDenied {
                    path: root.to_path_buf(),
                }
            } else {
                ScanError::ReadDirectory {
                    path: root.to_path_buf(),
                    source: e,
                }
            });
        }

        events.send(Event::Scan(ScanEvent::Started {
            path: root.to_path_buf(),
        }));

        let mut result = ScanResult::default();
        let mut directories_scanned = 0;

        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || include_hidden || !is_hidden(e.path()));

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let error = self.walk_error(e, root);
                    tracing::debug!(error = %error, "skipping unreadable entry");
                    events.send(Event::Scan(ScanEvent::Error {
                        path: root.to_path_buf(),
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                directories_scanned += 1;
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_scanned,
                    files_found: result.files.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if !self.filter.should_include(path) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    events.send(Event::Scan(ScanEvent::FileFound {
                        path: path.to_path_buf(),
                    }));
                    result.files.push(RawFile {
                        path: path.to_path_buf(),
                        size: metadata.len(),
                        modified: metadata
                            .modified()
                            .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                        format: self.filter.get_format(path),
                    });
                }
                Err(e) => {
                    let error = self.walk_error(e, root);
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.to_path_buf(),
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                }
            }
        }

        result.files.sort_by(|a, b| a.path.cmp(&b.path));

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.files.len(),
        }));

        tracing::debug!(
            path = %root.display(),
            files = result.files.len(),
            errors = result.errors.len(),
            "listed flat-field directory"
        );

        Ok(result)
    }
}
