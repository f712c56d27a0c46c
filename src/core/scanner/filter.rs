//! File filtering logic for the scanner.

use super::RawFormat;
use std::collections::HashSet;
use std::path::Path;

/// Decides which directory entries are raw flat-field candidates
pub struct RawFilter {
    extensions: HashSet<String>,
    include_hidden: bool,
}

impl RawFilter {
    /// Create a filter accepting every supported raw extension
    pub fn new() -> Self {
        Self {
            extensions: RawFormat::default_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Override the accepted extensions (case-insensitive)
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Get the raw format for a path
    pub fn get_format(&self, path: &Path) -> RawFormat {
        path.extension()
            .and_then(|e| e.to_str())
            .map(RawFormat::from_extension)
            .unwrap_or(RawFormat::Unknown)
    }
}

impl Default for RawFilter {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
