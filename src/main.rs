//! # ffcat CLI
//!
//! Inspect a flat-field directory and try lookups against it.
//!
//! ## Usage
//! ```bash
//! ffcat stats ~/Pictures/flats
//! ffcat find ~/Pictures/flats --make Canon --model "EOS 5D" --focal 50 --aperture 2.8
//! ffcat match ~/Pictures/flats IMG_0042.CR2 --output json
//! ```

mod cli;

use flatfield_catalog::Result;

fn main() -> Result<()> {
    flatfield_catalog::init_tracing();
    cli::run()
}
