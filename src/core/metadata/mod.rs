//! # Metadata Module
//!
//! Reads the shot parameters that identify a flat-field frame.
//!
//! ## Extracted Fields
//! - Camera make and model
//! - Lens model (empty when the lens reports nothing, e.g. manual glass)
//! - Focal length in mm
//! - Aperture as an f-number
//! - Capture time (DateTimeOriginal, falling back to the file mtime)
//!
//! Most raw containers (CR2, NEF, ARW, DNG, ORF, PEF...) are TIFF based
//! and carry a regular EXIF directory.

mod memory;

pub use memory::InMemoryMetadata;

use crate::error::MetadataError;
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, In, Reader, Tag, Value};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Files at least this large are memory mapped instead of read into memory
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Shot parameters of one raw file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotMetadata {
    /// Camera make (e.g., "Canon")
    pub maker: String,
    /// Camera model (e.g., "Canon EOS 5D Mark IV")
    pub model: String,
    /// Lens model, empty if unknown
    pub lens: String,
    /// Focal length in millimetres
    pub focal_length: f64,
    /// Aperture as an f-number
    pub aperture: f64,
    /// Capture time in seconds since the Unix epoch
    pub timestamp: i64,
}

impl ShotMetadata {
    pub fn new(
        maker: impl Into<String>,
        model: impl Into<String>,
        lens: impl Into<String>,
        focal_length: f64,
        aperture: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            maker: maker.into(),
            model: model.into(),
            lens: lens.into(),
            focal_length,
            aperture,
            timestamp,
        }
    }

    /// Reject focal lengths and apertures that cannot be scored
    pub fn validate(&self, path: &Path) -> Result<(), MetadataError> {
        let checks = [
            ("focal length", self.focal_length),
            ("aperture", self.aperture),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(MetadataError::Invalid {
                    path: path.to_path_buf(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Get a display string for the camera
    pub fn camera_display(&self) -> String {
        if self.model.starts_with(&self.maker) {
            self.model.clone()
        } else {
            format!("{} {}", self.maker, self.model)
        }
    }
}

/// Source of shot metadata for a file
pub trait MetadataReader: Send + Sync {
    /// Read the shot parameters of `path`
    fn read_metadata(&self, path: &Path) -> Result<ShotMetadata, MetadataError>;
}

/// Reader backed by the EXIF directory of the raw container
#[derive(Debug, Default, Clone)]
pub struct ExifMetadataReader;

impl ExifMetadataReader {
    pub fn new() -> Self {
        Self
    }

    fn read_exif(path: &Path) -> Result<Exif, MetadataError> {
        let unreadable = |reason: String| MetadataError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let len = file.metadata().map_err(|e| unreadable(e.to_string()))?.len();

        let result = if len >= MMAP_THRESHOLD {
            // SAFETY: the mapping is read-only and `file` outlives it.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| unreadable(e.to_string()))?;
            Reader::new().read_from_container(&mut Cursor::new(&mmap[..]))
        } else {
            let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
            Reader::new().read_from_container(&mut Cursor::new(bytes))
        };

        result.map_err(|e| unreadable(e.to_string()))
    }
}

impl MetadataReader for ExifMetadataReader {
    fn read_metadata(&self, path: &Path) -> Result<ShotMetadata, MetadataError> {
        let exif = Self::read_exif(path)?;
        let missing = |field: &'static str| MetadataError::MissingField {
            path: path.to_path_buf(),
            field,
        };

        let maker = string_field(&exif, Tag::Make).ok_or_else(|| missing("camera make"))?;
        let model = string_field(&exif, Tag::Model).ok_or_else(|| missing("camera model"))?;
        let lens = string_field(&exif, Tag::LensModel).unwrap_or_default();
        let focal_length =
            rational_field(&exif, Tag::FocalLength).ok_or_else(|| missing("focal length"))?;
        let aperture = rational_field(&exif, Tag::FNumber).ok_or_else(|| missing("aperture"))?;

        let timestamp = date_taken(&exif)
            .or_else(|| file_mtime(path))
            .ok_or_else(|| missing("capture time"))?;

        Ok(ShotMetadata {
            maker,
            model,
            lens,
            focal_length,
            aperture,
            timestamp,
        })
    }
}

fn date_taken(exif: &Exif) -> Option<i64> {
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    let s = first_ascii(&field.value)?;
    // EXIF date format: "YYYY:MM:DD HH:MM:SS"
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp())
}

fn file_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).timestamp())
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Rational(ref vec) => vec.first().map(|r| r.to_f64()),
        Value::SRational(ref vec) => vec.first().map(|r| r.to_f64()),
        _ => None,
    }
}

fn string_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let trimmed = first_ascii(&field.value)?.trim_end_matches('\0').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_ascii(value: &Value) -> Option<&str> {
    match value {
        Value::Ascii(vec) => vec.first().and_then(|bytes| std::str::from_utf8(bytes).ok()),
        _ => None,
    }
}
