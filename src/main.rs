//! # apod-cache CLI
//!
//! Command-line interface for the APOD image cache.
//!
//! ## Usage
//! ```bash
//! apod-cache add ~/Downloads/NGC3521.jpg --title "NGC #3521: Galaxy in a Bubble" \
//!     --source-url https://apod.nasa.gov/apod/image/2205/NGC3521LRGBHaAPOD-20.jpg
//! apod-cache list --output json
//! ```

mod cli;

use apod_cache::Result;

fn main() -> Result<()> {
    cli::run()
}
