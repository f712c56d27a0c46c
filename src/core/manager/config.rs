//! Configuration for the flat-field manager.

use crate::core::catalog::DEFAULT_SIBLING_WINDOW_SECS;
use crate::core::scanner::ScanConfig;

/// Settings shared by every catalog the manager builds
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Shots of the same configuration taken within this many seconds of
    /// an entry's primary file are grouped as siblings
    pub sibling_window_secs: i64,
    /// Average sibling frames when resolving a flat field
    pub average_siblings: bool,
    /// Directory listing settings for the default lister
    pub scan: ScanConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sibling_window_secs: DEFAULT_SIBLING_WINDOW_SECS,
            average_siblings: true,
            scan: ScanConfig::default(),
        }
    }
}
