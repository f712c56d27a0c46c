//! # Events Module
//!
//! Progress reporting for catalog scans, usable from any UI.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Catalog(CatalogEvent::FileSkipped { path, message }) = event {
//!             eprintln!("skipped {}: {}", path.display(), message);
//!         }
//!     }
//! });
//!
//! manager.initialize_with_events("/flats", &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
