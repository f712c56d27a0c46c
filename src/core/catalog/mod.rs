//! # Catalog Module
//!
//! In-memory index of flat-field frames and the nearest-match search.
//!
//! ## Structure
//! Entries are bucketed by an identity key built from maker, model, lens,
//! focal length and aperture. The buckets only speed up sibling grouping;
//! `search` scores every entry, so correctness never depends on keys
//! matching exactly.
//!
//! ## Siblings
//! Files with exactly the same five identity fields taken within
//! `sibling_window_secs` of an entry's primary file join that entry as
//! siblings. They can be averaged into one less noisy flat field.
//!
//! ## Sharing
//! Entries are held in `Arc`s so a lookup can keep its entry (and decode
//! it) after releasing whatever lock guards the catalog. Adding a sibling
//! to an entry that is shared copies it first.

mod distance;
mod entry;
mod key;

pub use distance::{
    distance, Distance, Shot, LENS_MISMATCH_PENALTY, SCORE_EPSILON, W_APERTURE, W_FOCAL,
};
pub use entry::{CatalogEntry, EntrySummary};
pub use key::identity_key;

use crate::core::metadata::{MetadataReader, ShotMetadata};
use crate::core::scanner::DirectoryLister;
use crate::error::{MetadataError, QueryError, ScanError};
use crate::events::{CatalogEvent, Event, EventSender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default window for grouping shots into siblings (6 hours)
pub const DEFAULT_SIBLING_WINDOW_SECS: i64 = 6 * 60 * 60;

/// Entry and file counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Distinct entries (sibling groups count once)
    pub entry_count: usize,
    /// Indexed files including siblings
    pub file_count: usize,
}

/// What `insert` did with a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The file became a new entry under `key`
    NewEntry { key: String },
    /// The file joined the entry whose primary file is `primary`
    Sibling { primary: PathBuf },
}

/// Outcome of `populate`
#[derive(Debug, Default)]
pub struct PopulateReport {
    /// Files returned by the lister
    pub files_listed: usize,
    /// New entries created
    pub entries_added: usize,
    /// Files grouped into existing entries
    pub siblings_grouped: usize,
    /// Files skipped because of unusable metadata
    pub skipped: Vec<MetadataError>,
    /// Non-fatal listing errors
    pub scan_errors: Vec<ScanError>,
}

/// Ordered multi-map of flat-field entries
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: BTreeMap<String, Vec<Arc<CatalogEntry>>>,
    /// Files looked up by path that are not part of the indexed directory
    selected: HashMap<PathBuf, Arc<CatalogEntry>>,
    sibling_window_secs: i64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::with_sibling_window(DEFAULT_SIBLING_WINDOW_SECS)
    }

    pub fn with_sibling_window(sibling_window_secs: i64) -> Self {
        Self {
            entries: BTreeMap::new(),
            selected: HashMap::new(),
            sibling_window_secs: sibling_window_secs.max(0),
        }
    }

    pub fn sibling_window_secs(&self) -> i64 {
        self.sibling_window_secs
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order, then arrival order within a key
    pub fn entries(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.entries.values().flatten()
    }

    pub fn stats(&self) -> CatalogStats {
        self.entries().fold(CatalogStats::default(), |mut stats, entry| {
            stats.entry_count += 1;
            stats.file_count += entry.file_count();
            stats
        })
    }

    /// Drop every entry, freeing their decoded frames
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected.clear();
    }

    /// Add a file to the catalog.
    ///
    /// With `pool` set, a file matching an existing entry on all five
    /// identity fields and taken within the sibling window becomes a
    /// sibling of that entry. Otherwise it becomes a new entry.
    pub fn insert(
        &mut self,
        path: impl Into<PathBuf>,
        shot: ShotMetadata,
        pool: bool,
    ) -> Result<InsertOutcome, MetadataError> {
        let path = path.into();
        shot.validate(&path)?;

        let key = identity_key(
            &shot.maker,
            &shot.model,
            &shot.lens,
            shot.focal_length,
            shot.aperture,
        );
        let bucket = self.entries.entry(key.clone()).or_default();

        if pool {
            let window = self.sibling_window_secs;
            if let Some(existing) = bucket.iter_mut().find(|e| {
                e.same_configuration(&shot) && e.timestamp().abs_diff(shot.timestamp) <= window as u64
            }) {
                Arc::make_mut(existing).push_sibling(path);
                return Ok(InsertOutcome::Sibling {
                    primary: existing.primary_path().to_path_buf(),
                });
            }
        }

        bucket.push(Arc::new(CatalogEntry::new(path, shot)));
        Ok(InsertOutcome::NewEntry { key })
    }

    /// Index every raw file of `directory`.
    ///
    /// A listing failure is returned and leaves the catalog untouched.
    /// Files whose metadata cannot be read or is unusable are skipped and
    /// reported. Metadata is read in parallel; files are inserted in path
    /// order so sibling grouping is deterministic.
    pub fn populate(
        &mut self,
        directory: &Path,
        lister: &dyn DirectoryLister,
        reader: &dyn MetadataReader,
        events: &EventSender,
    ) -> Result<PopulateReport, ScanError> {
        let listing = lister.list_entries_with_events(directory, events)?;

        let mut report = PopulateReport {
            files_listed: listing.files.len(),
            scan_errors: listing.errors,
            ..Default::default()
        };

        let read: Vec<(PathBuf, Result<ShotMetadata, MetadataError>)> = listing
            .files
            .par_iter()
            .map(|file| (file.path.clone(), reader.read_metadata(&file.path)))
            .collect();

        for (path, metadata) in read {
            let outcome = metadata.and_then(|shot| self.insert(path.clone(), shot, true));
            match outcome {
                Ok(InsertOutcome::NewEntry { key }) => {
                    report.entries_added += 1;
                    events.send(Event::Catalog(CatalogEvent::FileIndexed { path, key }));
                }
                Ok(InsertOutcome::Sibling { primary }) => {
                    report.siblings_grouped += 1;
                    events.send(Event::Catalog(CatalogEvent::SiblingGrouped { path, primary }));
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping flat field");
                    events.send(Event::Catalog(CatalogEvent::FileSkipped {
                        path,
                        message: e.to_string(),
                    }));
                    report.skipped.push(e);
                }
            }
        }

        Ok(report)
    }

    /// Best flat field for a shot.
    ///
    /// The query is validated before anything is scanned. Among entries
    /// with a finite distance the lowest score wins; equal scores go to
    /// the entry taken closest in time to `timestamp`. `Ok(None)` means no
    /// entry fits this camera.
    pub fn search(
        &self,
        maker: &str,
        model: &str,
        lens: &str,
        focal_length: f64,
        aperture: f64,
        timestamp: i64,
    ) -> Result<Option<&Arc<CatalogEntry>>, QueryError> {
        let query = Shot::new(maker, model, lens, focal_length, aperture);
        query.validate()?;

        let mut best: Option<(&Arc<CatalogEntry>, f64, u64)> = None;

        for entry in self.entries() {
            let Some(score) = distance::score(&entry.as_shot(), &query).score() else {
                continue;
            };
            let delta = entry.timestamp().abs_diff(timestamp);

            let better = match best {
                None => true,
                Some((_, best_score, best_delta)) => {
                    score < best_score - SCORE_EPSILON
                        || ((score - best_score).abs() <= SCORE_EPSILON && delta < best_delta)
                }
            };
            if better {
                best = Some((entry, score, delta));
            }
        }

        if let Some((entry, score, _)) = best {
            tracing::debug!(
                flat_field = %entry.primary_path().display(),
                score,
                "matched flat field"
            );
        }

        Ok(best.map(|(entry, _, _)| entry))
    }

    /// Entry whose primary file is exactly `path`
    pub fn search_by_filename(&self, path: &Path) -> Option<&Arc<CatalogEntry>> {
        self.entries()
            .find(|e| e.primary_path() == path)
            .or_else(|| self.selected.get(path))
    }

    /// Remember a file picked by path outside the indexed directory.
    ///
    /// Such entries are found by `search_by_filename` only; they take no
    /// part in matching or statistics.
    pub fn add_selected(
        &mut self,
        path: impl Into<PathBuf>,
        shot: ShotMetadata,
    ) -> Result<&Arc<CatalogEntry>, MetadataError> {
        let path = path.into();
        shot.validate(&path)?;
        Ok(self
            .selected
            .entry(path.clone())
            .or_insert_with(|| Arc::new(CatalogEntry::new(path, shot))))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::InMemoryMetadata;
    use crate::core::scanner::FixedListing;
    use crate::events::{null_sender, EventChannel};

    fn shot(maker: &str, model: &str, lens: &str, focal: f64, aperture: f64, t: i64) -> ShotMetadata {
        ShotMetadata::new(maker, model, lens, focal, aperture, t)
    }

    #[test]
    fn search_on_empty_catalog_returns_none() {
        let catalog = Catalog::new();
        assert!(catalog
            .search("Canon", "5D", "", 50.0, 2.8, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn close_shots_are_grouped_as_siblings() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), true)
            .unwrap();
        let outcome = catalog
            .insert("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 105), true)
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Sibling {
                primary: PathBuf::from("/flats/a.CR2")
            }
        );
        assert_eq!(
            catalog.stats(),
            CatalogStats {
                entry_count: 1,
                file_count: 2
            }
        );

        let entry = catalog
            .search("Canon", "5D", "", 50.0, 2.8, 102)
            .unwrap()
            .unwrap();
        assert_eq!(entry.sibling_paths().len(), 1);
        assert_eq!(entry.sibling_paths()[0], PathBuf::from("/flats/b.CR2"));
    }

    #[test]
    fn distant_shots_are_separate_entries() {
        let mut catalog = Catalog::with_sibling_window(60);
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 0), true)
            .unwrap();
        catalog
            .insert("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 3600), true)
            .unwrap();

        assert_eq!(catalog.stats().entry_count, 2);
    }

    #[test]
    fn unpooled_insert_never_groups() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), false)
            .unwrap();
        catalog
            .insert("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), false)
            .unwrap();

        assert_eq!(catalog.stats().entry_count, 2);
    }

    #[test]
    fn other_camera_returns_none() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 0), true)
            .unwrap();
        catalog
            .insert("/flats/b.CR2", shot("Canon", "6D", "", 35.0, 4.0, 0), true)
            .unwrap();

        let result = catalog.search("Nikon", "D800", "", 50.0, 2.8, 0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn zero_aperture_is_rejected() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 0), true)
            .unwrap();

        let err = catalog.search("Canon", "5D", "", 50.0, 0.0, 0).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidMetadata {
                field: "aperture",
                ..
            }
        ));
    }

    #[test]
    fn lowest_score_wins() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/f4.CR2", shot("Canon", "5D", "", 50.0, 4.0, 0), true)
            .unwrap();
        catalog
            .insert("/flats/f2.8.CR2", shot("Canon", "5D", "", 50.0, 2.8, 0), true)
            .unwrap();
        catalog
            .insert("/flats/85.CR2", shot("Canon", "5D", "", 85.0, 2.8, 0), true)
            .unwrap();

        let entry = catalog
            .search("Canon", "5D", "", 50.0, 3.2, 0)
            .unwrap()
            .unwrap();
        assert_eq!(entry.primary_path(), Path::new("/flats/f2.8.CR2"));
    }

    #[test]
    fn equal_scores_prefer_closer_timestamp() {
        let mut catalog = Catalog::with_sibling_window(0);
        catalog
            .insert("/flats/old.CR2", shot("Canon", "5D", "", 50.0, 2.8, 1_000), true)
            .unwrap();
        catalog
            .insert("/flats/new.CR2", shot("Canon", "5D", "", 50.0, 2.8, 9_000), true)
            .unwrap();

        let entry = catalog
            .search("Canon", "5D", "", 50.0, 2.8, 8_000)
            .unwrap()
            .unwrap();
        assert_eq!(entry.primary_path(), Path::new("/flats/new.CR2"));

        let entry = catalog
            .search("Canon", "5D", "", 50.0, 2.8, 2_000)
            .unwrap()
            .unwrap();
        assert_eq!(entry.primary_path(), Path::new("/flats/old.CR2"));
    }

    #[test]
    fn lens_mismatch_still_matches_when_nothing_better() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "EF24-70mm", 50.0, 2.8, 0), true)
            .unwrap();

        let entry = catalog
            .search("Canon", "5D", "EF50mm", 50.0, 2.8, 0)
            .unwrap();
        assert!(entry.is_some());
    }

    #[test]
    fn search_scans_beyond_exact_key() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.04, 2.8, 0), true)
            .unwrap();

        // 50.06 rounds to a different key but is still the best match
        let entry = catalog
            .search("Canon", "5D", "", 50.06, 2.8, 0)
            .unwrap();
        assert!(entry.is_some());
    }

    #[test]
    fn invalid_metadata_is_not_inserted() {
        let mut catalog = Catalog::new();
        let err = catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 0.0, 2.8, 0), true)
            .unwrap_err();

        assert!(matches!(err, MetadataError::Invalid { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn search_by_filename_finds_primary_only() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), true)
            .unwrap();
        catalog
            .insert("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 101), true)
            .unwrap();

        assert!(catalog.search_by_filename(Path::new("/flats/a.CR2")).is_some());
        assert!(catalog.search_by_filename(Path::new("/flats/b.CR2")).is_none());
        assert!(catalog.search_by_filename(Path::new("/flats/c.CR2")).is_none());
    }

    #[test]
    fn selected_files_are_found_by_name_but_not_matched() {
        let mut catalog = Catalog::new();
        catalog
            .add_selected("/elsewhere/x.NEF", shot("Nikon", "D800", "", 50.0, 2.8, 0))
            .unwrap();

        assert!(catalog.search_by_filename(Path::new("/elsewhere/x.NEF")).is_some());
        assert!(catalog
            .search("Nikon", "D800", "", 50.0, 2.8, 0)
            .unwrap()
            .is_none());
        assert_eq!(catalog.stats(), CatalogStats::default());
    }

    #[test]
    fn populate_groups_and_skips() {
        let lister = FixedListing::new().with_directory(
            "/flats",
            vec![
                PathBuf::from("/flats/a.CR2"),
                PathBuf::from("/flats/b.CR2"),
                PathBuf::from("/flats/c.NEF"),
                PathBuf::from("/flats/broken.CR2"),
            ],
        );
        let reader = InMemoryMetadata::new()
            .with("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100))
            .with("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 105))
            .with("/flats/c.NEF", shot("Nikon", "D800", "", 35.0, 8.0, 100));

        let (sender, receiver) = EventChannel::new();
        let mut catalog = Catalog::new();
        let report = catalog
            .populate(Path::new("/flats"), &lister, &reader, &sender)
            .unwrap();
        drop(sender);

        assert_eq!(report.files_listed, 4);
        assert_eq!(report.entries_added, 2);
        assert_eq!(report.siblings_grouped, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            catalog.stats(),
            CatalogStats {
                entry_count: 2,
                file_count: 3
            }
        );

        let skipped = receiver
            .iter()
            .filter(|e| matches!(e, Event::Catalog(CatalogEvent::FileSkipped { .. })))
            .count();
        assert_eq!(skipped, 1);
    }

    #[test]
    fn populate_missing_directory_fails() {
        let lister = FixedListing::new();
        let reader = InMemoryMetadata::new();
        let mut catalog = Catalog::new();

        let result = catalog.populate(Path::new("/nowhere"), &lister, &reader, &null_sender());
        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }

    #[test]
    fn sibling_added_to_cloned_catalog_leaves_original_alone() {
        let mut original = Catalog::new();
        original
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), true)
            .unwrap();

        let mut copy = original.clone();
        copy.insert("/flats/b.CR2", shot("Canon", "5D", "", 50.0, 2.8, 105), true)
            .unwrap();

        assert_eq!(original.stats().file_count, 1);
        assert_eq!(copy.stats().file_count, 2);
    }

    #[test]
    fn search_result_outlives_a_cleared_catalog() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 100), true)
            .unwrap();

        let entry = Arc::clone(
            catalog
                .search("Canon", "5D", "", 50.0, 2.8, 100)
                .unwrap()
                .unwrap(),
        );
        catalog.clear();

        assert_eq!(entry.primary_path(), Path::new("/flats/a.CR2"));
        assert_eq!(Arc::strong_count(&entry), 1);
    }

    #[test]
    fn clear_empties_catalog() {
        let mut catalog = Catalog::new();
        catalog
            .insert("/flats/a.CR2", shot("Canon", "5D", "", 50.0, 2.8, 0), true)
            .unwrap();
        catalog.clear();
        assert!(catalog.is_empty());
        assert_eq!(catalog.stats().file_count, 0);
    }
}
