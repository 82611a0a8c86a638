//! # Manager Module
//!
//! Orchestrates "ensure an image is cached".
//!
//! ## Steps
//! 1. **Fingerprint** - Hash the downloaded bytes
//! 2. **Lookup** - A known fingerprint is a cache hit; return its id
//! 3. **Write** - On a miss, write the bytes under the first sanitized name
//!    that no record owns (temp file, then no-clobber rename)
//! 4. **Record** - Insert metadata only once the file is in place
//!
//! ## Example
//! ```rust,no_run
//! use apod_cache::core::manager::{CacheConfig, CacheManager};
//!
//! # fn main() -> apod_cache::Result<()> {
//! let manager = CacheManager::open(&CacheConfig::new("/tmp/apod/images"))?;
//! let bytes = std::fs::read("download.jpg").unwrap_or_default();
//! let id = manager.ensure_cached(
//!     &bytes,
//!     "NGC #3521: Galaxy in a Bubble",
//!     "Gorgeous spiral galaxy NGC 3521 is a mere 35 million light-years away.",
//!     "https://apod.nasa.gov/apod/image/2205/NGC3521LRGBHaAPOD-20.jpg",
//! )?;
//! let wallpaper = manager.background_path(id)?;
//! # Ok(())
//! # }
//! ```

mod cache_manager;
mod config;

pub use cache_manager::{CacheManager, CacheStats, VerifyReport, STALE_TEMP_AGE};
pub use config::{CacheConfig, APP_DIR_NAME, IMAGES_DIR_NAME};
