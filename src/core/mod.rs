//! # Core Module
//!
//! The flat-field catalog engine, independent of any front end.
//!
//! ## Modules
//! - `scanner` - Lists raw files in a directory
//! - `metadata` - Reads camera and lens data from raw files
//! - `frame` - Decodes and averages raw frames
//! - `catalog` - Indexes flat fields and finds the nearest match
//! - `manager` - Shared service wrapping one catalog

pub mod catalog;
pub mod frame;
pub mod manager;
pub mod metadata;
pub mod scanner;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry, CatalogStats, Distance};
pub use frame::{DecodedFrame, FrameDecoder, FrameHandle};
pub use manager::{CatalogConfig, FlatFieldManager, FlatFieldManagerBuilder};
pub use metadata::{MetadataReader, ShotMetadata};
pub use scanner::{DirectoryLister, RawFile};
