//! Integration tests for the flat-field manager.
//!
//! These run the manager against in-memory collaborators:
//! - Matching by camera, lens and capture settings
//! - Sibling grouping and averaging
//! - Catalog lifecycle (re-initialize, reload, clear)
//! - Concurrent lookups

use flatfield_catalog::core::frame::{DecodedFrame, InMemoryDecoder, PixelData};
use flatfield_catalog::core::metadata::{InMemoryMetadata, ShotMetadata};
use flatfield_catalog::core::scanner::FixedListing;
use flatfield_catalog::error::{FlatFieldError, QueryError};
use flatfield_catalog::events::{CatalogEvent, Event, EventChannel};
use flatfield_catalog::FlatFieldManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Setup {
    lister: Arc<FixedListing>,
    reader: Arc<InMemoryMetadata>,
    decoder: Arc<InMemoryDecoder>,
}

impl Setup {
    fn new(files: &[(&str, ShotMetadata)]) -> Self {
        let reader = InMemoryMetadata::new();
        let mut paths = Vec::new();
        for (path, shot) in files {
            reader.insert(*path, shot.clone());
            paths.push(PathBuf::from(path));
        }

        Self {
            lister: Arc::new(FixedListing::new().with_directory("/flats", paths)),
            reader: Arc::new(reader),
            decoder: Arc::new(InMemoryDecoder::new()),
        }
    }

    fn manager(&self) -> FlatFieldManager {
        FlatFieldManager::builder()
            .lister(self.lister.clone())
            .reader(self.reader.clone())
            .decoder(self.decoder.clone())
            .build()
    }
}

fn canon(focal: f64, aperture: f64, timestamp: i64) -> ShotMetadata {
    ShotMetadata::new("Canon", "EOS 5D", "", focal, aperture, timestamp)
}

#[test]
fn siblings_within_window_form_one_entry() {
    let setup = Setup::new(&[
        ("/flats/a.CR2", canon(50.0, 2.8, 100)),
        ("/flats/b.CR2", canon(50.0, 2.8, 105)),
    ]);
    let manager = setup.manager();

    let stats = manager.initialize("/flats").unwrap();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.file_count, 2);

    let entry = manager
        .find_entry_for("Canon", "EOS 5D", "", 50.0, 2.8, 102)
        .unwrap()
        .unwrap();
    assert_eq!(entry.primary_path(), Path::new("/flats/a.CR2"));
    assert_eq!(entry.sibling_paths(), &[PathBuf::from("/flats/b.CR2")]);

    let frame = manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 102)
        .unwrap()
        .unwrap();
    assert_eq!(frame.averaged_from, 2);
}

#[test]
fn other_camera_has_no_flat_field() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let found = manager
        .find_for("Nikon", "D800", "", 50.0, 2.8, 100)
        .unwrap();
    assert!(found.is_none());
    assert_eq!(setup.decoder.decode_count(), 0);
}

#[test]
fn nearest_settings_win() {
    let setup = Setup::new(&[
        ("/flats/wide.CR2", canon(24.0, 8.0, 100)),
        ("/flats/normal.CR2", canon(50.0, 4.0, 100)),
        ("/flats/tele.CR2", canon(200.0, 5.6, 100)),
    ]);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let entry = manager
        .find_entry_for("Canon", "EOS 5D", "", 55.0, 4.0, 100)
        .unwrap()
        .unwrap();
    assert_eq!(entry.primary_path(), Path::new("/flats/normal.CR2"));

    let entry = manager
        .find_entry_for("Canon", "EOS 5D", "", 180.0, 5.6, 100)
        .unwrap()
        .unwrap();
    assert_eq!(entry.primary_path(), Path::new("/flats/tele.CR2"));
}

#[test]
fn matching_lens_is_preferred() {
    let setup = Setup::new(&[
        (
            "/flats/a.CR2",
            ShotMetadata::new("Canon", "EOS 5D", "EF 50mm f/1.4", 50.0, 2.8, 100),
        ),
        (
            "/flats/b.CR2",
            ShotMetadata::new("Canon", "EOS 5D", "EF 24-70mm", 50.0, 2.8, 100),
        ),
    ]);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let entry = manager
        .find_entry_for("Canon", "EOS 5D", "EF 24-70mm", 50.0, 2.8, 100)
        .unwrap()
        .unwrap();
    assert_eq!(entry.primary_path(), Path::new("/flats/b.CR2"));
}

#[test]
fn equal_scores_go_to_closest_capture_time() {
    let day = 24 * 3600;
    let setup = Setup::new(&[
        ("/flats/old.CR2", canon(50.0, 2.8, 0)),
        ("/flats/new.CR2", canon(50.0, 2.8, 10 * day)),
    ]);
    let manager = setup.manager();
    let stats = manager.initialize("/flats").unwrap();
    assert_eq!(stats.entry_count, 2);

    let entry = manager
        .find_entry_for("Canon", "EOS 5D", "", 50.0, 2.8, 9 * day)
        .unwrap()
        .unwrap();
    assert_eq!(entry.primary_path(), Path::new("/flats/new.CR2"));
}

#[test]
fn invalid_query_is_an_error() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let err = manager
        .find_for("Canon", "EOS 5D", "", 50.0, 0.0, 100)
        .unwrap_err();
    assert!(matches!(
        err,
        FlatFieldError::Query(QueryError::InvalidMetadata { field: "aperture", .. })
    ));
}

#[test]
fn unreadable_files_are_skipped_and_reported() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    setup.lister.set_directory(
        "/flats",
        vec![PathBuf::from("/flats/a.CR2"), PathBuf::from("/flats/broken.CR2")],
    );
    let manager = setup.manager();

    let (sender, receiver) = EventChannel::new();
    let stats = manager.initialize_with_events("/flats", &sender).unwrap();
    drop(sender);

    assert_eq!(stats.file_count, 1);

    let events: Vec<Event> = receiver.iter().collect();
    let skipped: Vec<&PathBuf> = events
        .iter()
        .filter_map(|e| match e {
            Event::Catalog(CatalogEvent::FileSkipped { path, .. }) => Some(path),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![&PathBuf::from("/flats/broken.CR2")]);

    let summary = events.iter().find_map(|e| match e {
        Event::Catalog(CatalogEvent::Completed(summary)) => Some(summary),
        _ => None,
    });
    assert_eq!(summary.map(|s| s.skipped), Some(1));
}

#[test]
fn reinitializing_same_directory_reports_unchanged() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let (sender, receiver) = EventChannel::new();
    manager.initialize_with_events("/flats", &sender).unwrap();
    drop(sender);

    let events: Vec<Event> = receiver.iter().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        Event::Catalog(CatalogEvent::Unchanged { .. })
    ));
}

#[test]
fn switching_directory_replaces_catalog() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    setup.lister.set_directory("/other", vec![PathBuf::from("/other/n.NEF")]);
    setup.reader.insert(
        "/other/n.NEF",
        ShotMetadata::new("Nikon", "D800", "", 35.0, 8.0, 100),
    );
    let manager = setup.manager();

    manager.initialize("/flats").unwrap();
    let old = manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100)
        .unwrap()
        .unwrap();

    manager.initialize("/other").unwrap();
    assert_eq!(manager.current_path().unwrap(), Some(PathBuf::from("/other")));
    assert!(manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100)
        .unwrap()
        .is_none());

    // Handles taken from the old catalog stay valid
    assert_eq!(old.source, PathBuf::from("/flats/a.CR2"));
    assert_eq!(Arc::strong_count(&old), 1);
}

#[test]
fn decode_failure_is_retried_on_next_lookup() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    setup.decoder.set_failing("/flats/a.CR2", true);
    let manager = setup.manager();
    manager.initialize("/flats").unwrap();

    let err = manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100)
        .unwrap_err();
    assert!(matches!(err, FlatFieldError::Decode(_)));

    setup.decoder.set_failing("/flats/a.CR2", false);
    assert!(manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100)
        .unwrap()
        .is_some());
}

#[test]
fn averaged_frame_holds_mean_of_siblings() {
    let setup = Setup::new(&[
        ("/flats/a.CR2", canon(50.0, 2.8, 100)),
        ("/flats/b.CR2", canon(50.0, 2.8, 200)),
    ]);
    let decoder = Arc::new(
        InMemoryDecoder::new()
            .with_frame(
                "/flats/a.CR2",
                DecodedFrame::new("/flats/a.CR2", 2, 1, 1, PixelData::Integer(vec![1000, 2000])),
            )
            .with_frame(
                "/flats/b.CR2",
                DecodedFrame::new("/flats/b.CR2", 2, 1, 1, PixelData::Integer(vec![3000, 4000])),
            ),
    );
    let manager = FlatFieldManager::builder()
        .lister(setup.lister.clone())
        .reader(setup.reader.clone())
        .decoder(decoder)
        .build();
    manager.initialize("/flats").unwrap();

    let frame = manager
        .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 150)
        .unwrap()
        .unwrap();
    assert_eq!(frame.data, PixelData::Float(vec![2000.0, 3000.0]));
}

#[test]
fn narrow_window_keeps_shots_apart() {
    let setup = Setup::new(&[
        ("/flats/a.CR2", canon(50.0, 2.8, 0)),
        ("/flats/b.CR2", canon(50.0, 2.8, 600)),
    ]);
    let manager = FlatFieldManager::builder()
        .lister(setup.lister.clone())
        .reader(setup.reader.clone())
        .decoder(setup.decoder.clone())
        .sibling_window_secs(60)
        .build();

    let stats = manager.initialize("/flats").unwrap();
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.file_count, 2);
}

#[test]
fn concurrent_lookups_decode_once() {
    let setup = Setup::new(&[("/flats/a.CR2", canon(50.0, 2.8, 100))]);
    let manager = Arc::new(setup.manager());
    manager.initialize("/flats").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager
                    .find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100)
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    let frames: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(frames.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(setup.decoder.decode_count(), 1);
}

#[test]
fn lookups_during_reinitialize_see_a_whole_catalog() {
    let setup = Setup::new(&[
        ("/flats/a.CR2", canon(50.0, 2.8, 100)),
        ("/flats/b.CR2", canon(85.0, 2.8, 100)),
    ]);
    setup.lister.set_directory("/empty", Vec::new());
    let manager = Arc::new(setup.manager());
    manager.initialize("/flats").unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for i in 0..20 {
                let dir = if i % 2 == 0 { "/empty" } else { "/flats" };
                manager.initialize(dir).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let stats = manager.stats().unwrap();
        assert!(
            (stats.entry_count == 0 && stats.file_count == 0)
                || (stats.entry_count == 2 && stats.file_count == 2)
        );
    }

    writer.join().unwrap();
}

#[test]
fn slow_decode_does_not_hold_up_other_lookups() {
    let setup = Setup::new(&[
        ("/flats/slow.CR2", canon(50.0, 2.8, 100)),
        (
            "/flats/fast.NEF",
            ShotMetadata::new("Nikon", "D800", "", 35.0, 8.0, 100),
        ),
    ]);
    setup
        .lister
        .set_directory("/other", vec![PathBuf::from("/flats/fast.NEF")]);
    setup
        .decoder
        .set_delay("/flats/slow.CR2", Duration::from_millis(1500));
    let manager = Arc::new(setup.manager());
    manager.initialize("/flats").unwrap();

    // Decode the Nikon flat so later lookups are cache hits
    manager
        .find_for("Nikon", "D800", "", 35.0, 8.0, 100)
        .unwrap()
        .unwrap();

    let slow = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.find_for("Canon", "EOS 5D", "", 50.0, 2.8, 100))
    };
    while setup.decoder.decode_count_for(Path::new("/flats/slow.CR2")) == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let reinit = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.initialize("/other"))
    };
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    let frame = manager
        .find_for("Nikon", "D800", "", 35.0, 8.0, 100)
        .unwrap();
    let waited = start.elapsed();

    assert!(frame.is_some());
    assert!(
        waited < Duration::from_millis(500),
        "lookup waited {:?} behind another entry's decode",
        waited
    );

    reinit.join().unwrap().unwrap();
    assert!(slow.join().unwrap().unwrap().is_some());
}
