//! Cache location configuration.

use crate::core::store::DATABASE_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application directory name under the platform cache directory
pub const APP_DIR_NAME: &str = "apod-cache";

/// Directory name holding cached images
pub const IMAGES_DIR_NAME: &str = "images";

/// Where cached images and their metadata live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the image files
    pub cache_directory: PathBuf,
    /// SQLite metadata database
    pub database_path: PathBuf,
}

impl CacheConfig {
    /// Cache rooted at `cache_directory`, database stored alongside the images
    pub fn new(cache_directory: impl Into<PathBuf>) -> Self {
        let cache_directory = cache_directory.into();
        let database_path = cache_directory.join(DATABASE_FILE_NAME);
        Self {
            cache_directory,
            database_path,
        }
    }

    /// Keep the database somewhere other than the image directory
    pub fn with_database_path(mut self, database_path: impl Into<PathBuf>) -> Self {
        self.database_path = database_path.into();
        self
    }

    /// Platform cache directory, e.g. `~/.cache/apod-cache/images` on Linux.
    ///
    /// Falls back to `./images` when the platform has no cache directory.
    pub fn default_location() -> Self {
        let directory = dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(IMAGES_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(IMAGES_DIR_NAME));
        Self::new(directory)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::default_location()
    }
}
