//! A single flat-field record and its lazily decoded frame.

use super::distance::{distance, Distance, Shot};
use super::key::identity_key;
use crate::core::frame::{average_frames, FrameDecoder, FrameHandle};
use crate::core::metadata::ShotMetadata;
use crate::error::{DecodeError, QueryError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Metadata of one flat-field configuration plus its decoded frames.
///
/// The frame caches belong to this entry alone: a clone copies the
/// metadata and starts with empty caches, and dropping the entry frees
/// whatever it decoded.
pub struct CatalogEntry {
    primary_path: PathBuf,
    sibling_paths: Vec<PathBuf>,
    shot: ShotMetadata,
    frame: Mutex<Option<FrameHandle>>,
    averaged: Mutex<Option<FrameHandle>>,
}

impl CatalogEntry {
    /// Create an entry for `primary_path`.
    ///
    /// # Panics
    /// Debug builds assert that `primary_path` is not empty.
    pub fn new(primary_path: impl Into<PathBuf>, shot: ShotMetadata) -> Self {
        let primary_path = primary_path.into();
        debug_assert!(!primary_path.as_os_str().is_empty());
        Self {
            primary_path,
            sibling_paths: Vec::new(),
            shot,
            frame: Mutex::new(None),
            averaged: Mutex::new(None),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    /// Other files of the same configuration, in first-seen order
    pub fn sibling_paths(&self) -> &[PathBuf] {
        &self.sibling_paths
    }

    pub fn shot(&self) -> &ShotMetadata {
        &self.shot
    }

    pub fn maker(&self) -> &str {
        &self.shot.maker
    }

    pub fn model(&self) -> &str {
        &self.shot.model
    }

    pub fn lens(&self) -> &str {
        &self.shot.lens
    }

    pub fn focal_length(&self) -> f64 {
        self.shot.focal_length
    }

    pub fn aperture(&self) -> f64 {
        self.shot.aperture
    }

    pub fn timestamp(&self) -> i64 {
        self.shot.timestamp
    }

    /// Primary file plus siblings
    pub fn file_count(&self) -> usize {
        1 + self.sibling_paths.len()
    }

    pub fn identity_key(&self) -> String {
        identity_key(
            &self.shot.maker,
            &self.shot.model,
            &self.shot.lens,
            self.shot.focal_length,
            self.shot.aperture,
        )
    }

    pub(crate) fn as_shot(&self) -> Shot<'_> {
        Shot::new(
            &self.shot.maker,
            &self.shot.model,
            &self.shot.lens,
            self.shot.focal_length,
            self.shot.aperture,
        )
    }

    /// Distance from this flat field to a shot with the given parameters
    pub fn distance_to(
        &self,
        maker: &str,
        model: &str,
        lens: &str,
        focal_length: f64,
        aperture: f64,
    ) -> Result<Distance, QueryError> {
        let query = Shot::new(maker, model, lens, focal_length, aperture);
        distance(&self.as_shot(), &query)
    }

    /// True if `shot` has exactly this entry's five identity fields
    pub(crate) fn same_configuration(&self, shot: &ShotMetadata) -> bool {
        self.shot.maker == shot.maker
            && self.shot.model == shot.model
            && self.shot.lens == shot.lens
            && self.shot.focal_length == shot.focal_length
            && self.shot.aperture == shot.aperture
    }

    pub(crate) fn push_sibling(&mut self, path: PathBuf) {
        self.sibling_paths.push(path);
    }

    /// True once the primary frame has been decoded
    pub fn is_frame_cached(&self) -> bool {
        lock(&self.frame).is_some()
    }

    /// Decoded frame of the primary file.
    ///
    /// Decodes on first use and caches the result. Concurrent callers wait
    /// for the first decode instead of decoding again. A failed decode is
    /// not cached, so the next call retries.
    pub fn frame(&self, decoder: &dyn FrameDecoder) -> Result<FrameHandle, DecodeError> {
        let mut slot = lock(&self.frame);
        if let Some(frame) = slot.as_ref() {
            return Ok(Arc::clone(frame));
        }

        let frame = Arc::new(decoder.decode(&self.primary_path)?);
        *slot = Some(Arc::clone(&frame));
        Ok(frame)
    }

    /// Average of the primary and all sibling frames.
    ///
    /// Without siblings this is `frame()`. If any sibling fails to decode
    /// or does not match the primary's dimensions, the primary frame is
    /// used instead and kept as this entry's result, so siblings are not
    /// decoded again until the catalog is rebuilt. A failure of the primary
    /// itself is returned and retried on the next call.
    pub fn averaged_frame(&self, decoder: &dyn FrameDecoder) -> Result<FrameHandle, DecodeError> {
        if self.sibling_paths.is_empty() {
            return self.frame(decoder);
        }

        let mut slot = lock(&self.averaged);
        if let Some(frame) = slot.as_ref() {
            return Ok(Arc::clone(frame));
        }

        let primary = self.frame(decoder)?;

        let mut frames = Vec::with_capacity(self.file_count());
        frames.push(Arc::clone(&primary));
        for path in &self.sibling_paths {
            match decoder.decode(path) {
                Ok(frame) => frames.push(Arc::new(frame)),
                Err(e) => {
                    tracing::warn!(
                        primary = %self.primary_path.display(),
                        error = %e,
                        "sibling failed to decode, using primary flat field only"
                    );
                    *slot = Some(Arc::clone(&primary));
                    return Ok(primary);
                }
            }
        }

        match average_frames(&frames) {
            Ok(averaged) => {
                tracing::debug!(
                    primary = %self.primary_path.display(),
                    files = frames.len(),
                    "averaged flat fields"
                );
                let averaged = Arc::new(averaged);
                *slot = Some(Arc::clone(&averaged));
                Ok(averaged)
            }
            Err(e) => {
                tracing::warn!(
                    primary = %self.primary_path.display(),
                    error = %e,
                    "cannot average siblings, using primary flat field only"
                );
                *slot = Some(Arc::clone(&primary));
                Ok(primary)
            }
        }
    }

    /// Serializable view of the entry
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            key: self.identity_key(),
            primary_path: self.primary_path.clone(),
            sibling_paths: self.sibling_paths.clone(),
            shot: self.shot.clone(),
        }
    }
}

/// A poisoned slot still holds a consistent `Option`, so keep using it.
fn lock(slot: &Mutex<Option<FrameHandle>>) -> MutexGuard<'_, Option<FrameHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Clone for CatalogEntry {
    fn clone(&self) -> Self {
        Self {
            primary_path: self.primary_path.clone(),
            sibling_paths: self.sibling_paths.clone(),
            shot: self.shot.clone(),
            frame: Mutex::new(None),
            averaged: Mutex::new(None),
        }
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("primary_path", &self.primary_path)
            .field("sibling_paths", &self.sibling_paths)
            .field("shot", &self.shot)
            .field("frame_cached", &self.is_frame_cached())
            .finish()
    }
}

/// Entry metadata for reports and JSON output
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub primary_path: PathBuf,
    pub sibling_paths: Vec<PathBuf>,
    #[serde(flatten)]
    pub shot: ShotMetadata,
}
