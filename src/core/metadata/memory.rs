//! In-memory metadata source for tests and embedding.

use super::{MetadataReader, ShotMetadata};
use crate::error::MetadataError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Metadata reader answering from a path -> metadata table.
///
/// Paths without a registered record are reported as unreadable.
#[derive(Default)]
pub struct InMemoryMetadata {
    records: RwLock<HashMap<PathBuf, ShotMetadata>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record (builder style)
    pub fn with(self, path: impl Into<PathBuf>, metadata: ShotMetadata) -> Self {
        self.insert(path, metadata);
        self
    }

    /// Register or replace a record
    pub fn insert(&self, path: impl Into<PathBuf>, metadata: ShotMetadata) {
        if let Ok(mut records) = self.records.write() {
            records.insert(path.into(), metadata);
        }
    }
}

impl MetadataReader for InMemoryMetadata {
    fn read_metadata(&self, path: &Path) -> Result<ShotMetadata, MetadataError> {
        let records = self.records.read().map_err(|_| MetadataError::Unreadable {
            path: path.to_path_buf(),
            reason: "metadata table lock poisoned".to_string(),
        })?;

        records
            .get(path)
            .cloned()
            .ok_or_else(|| MetadataError::Unreadable {
                path: path.to_path_buf(),
                reason: "no metadata record".to_string(),
            })
    }
}
