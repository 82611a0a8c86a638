//! # Error Module
//!
//! Error types for the image cache.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, fingerprints, what went wrong
//! - **Distinguish causes** - a lost insert race is not a broken database
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ApodCacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("Image write error: {0}")]
    Write(#[from] WriteError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No cached image with {what}")]
    NotFound { what: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while persisting image bytes to the cache directory.
///
/// Whenever one of these is returned no record has been inserted.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create temporary file in {path}: {source}")]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write image data for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move image into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// Destination path the failed write was aimed at
    pub fn path(&self) -> &PathBuf {
        match self {
            WriteError::CreateDirectory { path, .. }
            | WriteError::TempFile { path, .. }
            | WriteError::Write { path, .. }
            | WriteError::Persist { path, .. } => path,
        }
    }
}

/// Errors that occur with the metadata store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("An image with fingerprint {fingerprint} is already cached")]
    DuplicateFingerprint { fingerprint: String },

    #[error("Another cached image already uses {path}")]
    DuplicatePath { path: PathBuf },

    #[error("Cache store lock was poisoned by a panicking thread")]
    LockPoisoned,

    #[error("Stored record {id} is invalid: {reason}")]
    InvalidRow { id: i64, reason: String },
}

impl StoreError {
    /// True when the insert lost to an existing record with the same content.
    ///
    /// Callers should treat this as "already cached" and re-query.
    pub fn is_duplicate_fingerprint(&self) -> bool {
        matches!(self, StoreError::DuplicateFingerprint { .. })
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ApodCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_includes_path() {
        let error = WriteError::Write {
            path: PathBuf::from("/cache/images/M31.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let message = error.to_string();
        assert!(message.contains("/cache/images/M31.jpg"));
        assert!(message.contains("disk full"));
        assert_eq!(error.path(), &PathBuf::from("/cache/images/M31.jpg"));
    }

    #[test]
    fn corrupted_store_suggests_recovery() {
        let error = StoreError::Corrupted {
            path: PathBuf::from("/cache/image_cache.db"),
        };
        let message = error.to_string();
        assert!(message.contains("Delete this file"));
    }

    #[test]
    fn duplicate_fingerprint_is_distinguishable() {
        let duplicate = StoreError::DuplicateFingerprint {
            fingerprint: "ab".repeat(32),
        };
        let query = StoreError::QueryFailed("disk I/O error".to_string());

        assert!(duplicate.is_duplicate_fingerprint());
        assert!(!query.is_duplicate_fingerprint());
    }

    #[test]
    fn not_found_names_the_key() {
        let error = ApodCacheError::NotFound {
            what: "id 7".to_string(),
        };
        assert_eq!(error.to_string(), "No cached image with id 7");
    }

    #[test]
    fn top_level_error_wraps_store_error() {
        let error: ApodCacheError = StoreError::LockPoisoned.into();
        assert!(matches!(error, ApodCacheError::Store(StoreError::LockPoisoned)));
        assert!(error.to_string().starts_with("Cache store error"));
    }
}
