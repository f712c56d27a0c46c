//! # Manager Module
//!
//! Owns the catalog of the configured flat-field directory and resolves
//! shots to flat-field frames.
//!
//! ## Example
//! ```rust,ignore
//! use flatfield_catalog::core::manager::FlatFieldManager;
//!
//! let manager = FlatFieldManager::builder()
//!     .sibling_window_secs(3600)
//!     .build();
//!
//! manager.initialize("/photos/flats")?;
//! if let Some(frame) = manager.find_for("Canon", "EOS 5D", "", 50.0, 2.8, shot_time)? {
//!     println!("{}x{}", frame.width, frame.height);
//! }
//! ```

mod config;
mod service;

pub use config::CatalogConfig;
pub use service::{FlatFieldManager, FlatFieldManagerBuilder};
