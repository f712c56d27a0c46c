//! The flat-field manager service.

use super::config::CatalogConfig;
use crate::core::catalog::{Catalog, CatalogEntry, CatalogStats};
use crate::core::frame::{FrameDecoder, FrameHandle, RawLoaderDecoder};
use crate::core::metadata::{ExifMetadataReader, MetadataReader};
use crate::core::scanner::{DirectoryLister, WalkDirScanner};
use crate::error::{CatalogError, FlatFieldError, Result};
use crate::events::{null_sender, CatalogEvent, CatalogSummary, Event, EventSender};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// Builder for a `FlatFieldManager`
pub struct FlatFieldManagerBuilder {
    config: CatalogConfig,
    lister: Option<Arc<dyn DirectoryLister>>,
    reader: Option<Arc<dyn MetadataReader>>,
    decoder: Option<Arc<dyn FrameDecoder>>,
}

impl FlatFieldManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: CatalogConfig::default(),
            lister: None,
            reader: None,
            decoder: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sibling grouping window in seconds
    pub fn sibling_window_secs(mut self, secs: i64) -> Self {
        self.config.sibling_window_secs = secs;
        self
    }

    /// Average sibling frames when resolving
    pub fn average_siblings(mut self, average: bool) -> Self {
        self.config.average_siblings = average;
        self
    }

    /// Include hidden files when listing
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.scan.include_hidden = include;
        self
    }

    /// Directory depth for the default lister (None = unlimited)
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.config.scan.max_depth = depth;
        self
    }

    /// Use a custom directory lister
    pub fn lister(mut self, lister: Arc<dyn DirectoryLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Use a custom metadata reader
    pub fn reader(mut self, reader: Arc<dyn MetadataReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Use a custom frame decoder
    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Build the manager; unset collaborators use walkdir, EXIF and rawloader
    pub fn build(self) -> FlatFieldManager {
        let scan = self.config.scan.clone();
        FlatFieldManager {
            lister: self
                .lister
                .unwrap_or_else(|| Arc::new(WalkDirScanner::new(scan))),
            reader: self
                .reader
                .unwrap_or_else(|| Arc::new(ExifMetadataReader::new())),
            decoder: self
                .decoder
                .unwrap_or_else(|| Arc::new(RawLoaderDecoder::new())),
            config: self.config,
            state: RwLock::new(State::default()),
            init_lock: Mutex::new(()),
        }
    }
}

impl Default for FlatFieldManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct State {
    catalog: Catalog,
    path: Option<PathBuf>,
    initialized: bool,
}

/// Owns the flat-field catalog of one directory and answers lookups.
///
/// Build one per application and share it (e.g. in an `Arc`). Lookups
/// run concurrently; `initialize` builds the replacement catalog aside and
/// swaps it in, so readers see either the old or the new catalog. The
/// state lock is held only to pick an entry, never while decoding.
pub struct FlatFieldManager {
    config: CatalogConfig,
    lister: Arc<dyn DirectoryLister>,
    reader: Arc<dyn MetadataReader>,
    decoder: Arc<dyn FrameDecoder>,
    state: RwLock<State>,
    /// Serializes catalog rebuilds
    init_lock: Mutex<()>,
}

impl FlatFieldManager {
    pub fn builder() -> FlatFieldManagerBuilder {
        FlatFieldManagerBuilder::new()
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Index `directory`.
    ///
    /// Calling it again with the directory that is already indexed does
    /// nothing. An empty path empties the catalog. If the directory cannot
    /// be listed the previous catalog stays in place.
    pub fn initialize(&self, directory: impl AsRef<Path>) -> Result<CatalogStats> {
        self.initialize_with_events(directory, &null_sender())
    }

    /// `initialize` with progress reporting via events
    pub fn initialize_with_events(
        &self,
        directory: impl AsRef<Path>,
        events: &EventSender,
    ) -> Result<CatalogStats> {
        let directory = directory.as_ref();
        let _guard = self.init_lock.lock().map_err(|_| CatalogError::LockPoisoned)?;

        if directory.as_os_str().is_empty() {
            let old = std::mem::take(&mut *self.write()?);
            drop(old);
            tracing::info!("flat-field catalog cleared");
            events.send(Event::Catalog(CatalogEvent::Cleared));
            return Ok(CatalogStats::default());
        }

        {
            let state = self.read()?;
            if state.initialized && state.path.as_deref() == Some(directory) {
                tracing::debug!(path = %directory.display(), "flat-field directory already indexed");
                events.send(Event::Catalog(CatalogEvent::Unchanged {
                    path: directory.to_path_buf(),
                }));
                return Ok(state.catalog.stats());
            }
        }

        self.rebuild(directory, events)
    }

    /// Rescan the current directory even if it is already indexed
    pub fn reload(&self) -> Result<CatalogStats> {
        self.reload_with_events(&null_sender())
    }

    /// `reload` with progress reporting via events
    pub fn reload_with_events(&self, events: &EventSender) -> Result<CatalogStats> {
        let _guard = self.init_lock.lock().map_err(|_| CatalogError::LockPoisoned)?;
        let directory = self
            .read()?
            .path
            .clone()
            .ok_or_else(|| FlatFieldError::Config("no flat-field directory to reload".to_string()))?;

        self.rebuild(&directory, events)
    }

    /// Must be called with `init_lock` held
    fn rebuild(&self, directory: &Path, events: &EventSender) -> Result<CatalogStats> {
        let start = Instant::now();
        events.send(Event::Catalog(CatalogEvent::Started {
            path: directory.to_path_buf(),
        }));

        let mut catalog = Catalog::with_sibling_window(self.config.sibling_window_secs);
        let report = catalog
            .populate(
                directory,
                self.lister.as_ref(),
                self.reader.as_ref(),
                events,
            )
            .inspect_err(|e| {
                tracing::warn!(path = %directory.display(), error = %e, "cannot index flat-field directory");
            })?;

        let stats = catalog.stats();
        let old = std::mem::replace(
            &mut *self.write()?,
            State {
                catalog,
                path: Some(directory.to_path_buf()),
                initialized: true,
            },
        );
        // Frames decoded from the previous catalog are released here,
        // outside the state lock.
        drop(old);

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            path = %directory.display(),
            entries = stats.entry_count,
            files = stats.file_count,
            skipped = report.skipped.len(),
            duration_ms,
            "flat-field catalog ready"
        );
        events.send(Event::Catalog(CatalogEvent::Completed(CatalogSummary {
            path: directory.to_path_buf(),
            entry_count: stats.entry_count,
            file_count: stats.file_count,
            skipped: report.skipped.len(),
            duration_ms,
        })));

        Ok(stats)
    }

    /// Directory of the current catalog
    pub fn current_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.read()?.path.clone())
    }

    /// Entry and file counts of the current catalog
    pub fn stats(&self) -> Result<CatalogStats> {
        Ok(self.read()?.catalog.stats())
    }

    /// Copies of all entries, without decoded frames
    pub fn entries(&self) -> Result<Vec<Arc<CatalogEntry>>> {
        Ok(self.read()?.catalog.entries().cloned().collect())
    }

    /// Flat-field frame for a shot, or `None` if no entry fits the camera
    pub fn find_for(
        &self,
        maker: &str,
        model: &str,
        lens: &str,
        focal_length: f64,
        aperture: f64,
        timestamp: i64,
    ) -> Result<Option<FrameHandle>> {
        let entry = self.find_entry_for(maker, model, lens, focal_length, aperture, timestamp)?;

        match entry {
            Some(entry) => Ok(Some(self.materialize(&entry)?)),
            None => {
                tracing::debug!(maker, model, lens, focal_length, aperture, "no flat field found");
                Ok(None)
            }
        }
    }

    /// The entry `find_for` would use, without decoding anything
    pub fn find_entry_for(
        &self,
        maker: &str,
        model: &str,
        lens: &str,
        focal_length: f64,
        aperture: f64,
        timestamp: i64,
    ) -> Result<Option<Arc<CatalogEntry>>> {
        let state = self.read()?;
        let entry = state
            .catalog
            .search(maker, model, lens, focal_length, aperture, timestamp)?;
        Ok(entry.cloned())
    }

    /// Frame of a specific flat-field file.
    ///
    /// A file outside the indexed directory is read and remembered, so it
    /// is decoded only once. `None` if its metadata cannot be read.
    pub fn find_by_path(&self, path: impl AsRef<Path>) -> Result<Option<FrameHandle>> {
        let path = path.as_ref();

        let known = self.read()?.catalog.search_by_filename(path).cloned();
        if let Some(entry) = known {
            return Ok(Some(self.materialize(&entry)?));
        }

        let shot = match self.reader.read_metadata(path) {
            Ok(shot) => shot,
            Err(e) => {
                tracing::debug!(error = %e, "selected flat field is unreadable");
                return Ok(None);
            }
        };

        let entry = match self.write()?.catalog.add_selected(path, shot) {
            Ok(entry) => Arc::clone(entry),
            Err(e) => {
                tracing::debug!(error = %e, "selected flat field has unusable metadata");
                return Ok(None);
            }
        };

        Ok(Some(self.materialize(&entry)?))
    }

    /// Called without the state lock held
    fn materialize(&self, entry: &CatalogEntry) -> Result<FrameHandle> {
        let frame = if self.config.average_siblings {
            entry.averaged_frame(self.decoder.as_ref())?
        } else {
            entry.frame(self.decoder.as_ref())?
        };
        Ok(frame)
    }

    fn read(&self) -> std::result::Result<RwLockReadGuard<'_, State>, CatalogError> {
        self.state.read().map_err(|_| CatalogError::LockPoisoned)
    }

    fn write(&self) -> std::result::Result<RwLockWriteGuard<'_, State>, CatalogError> {
        self.state.write().map_err(|_| CatalogError::LockPoisoned)
    }
}

impl Default for FlatFieldManager {
    fn default() -> Self {
        Self::builder().build()
    }
}
