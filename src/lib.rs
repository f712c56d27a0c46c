//! # Flat-Field Catalog
//!
//! Indexes a directory of flat-field raw files and finds the best flat
//! field for a photo by camera, lens, focal length and aperture.
//!
//! ## Architecture
//! - `core` - Scanning, metadata, decoding, the catalog and its manager
//! - `events` - Progress reporting over channels
//! - `error` - Error types
//!
//! ## Example
//! ```rust,ignore
//! use flatfield_catalog::FlatFieldManager;
//!
//! let manager = FlatFieldManager::default();
//! manager.initialize("/photos/flats")?;
//! let flat = manager.find_for("Nikon", "D800", "", 24.0, 8.0, shot_time)?;
//! ```

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::{CatalogConfig, FlatFieldManager, FlatFieldManagerBuilder};
pub use error::{FlatFieldError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
