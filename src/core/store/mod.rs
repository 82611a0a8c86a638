//! # Store Module
//!
//! Persists metadata for cached images.
//!
//! ## Guarantees
//! - At most one record per distinct image content (fingerprint)
//! - At most one record per file path
//! - Record ids are assigned monotonically and never reused
//! - Records are insert-only; they are never mutated after creation
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::{SqliteStore, DATABASE_FILE_NAME};
pub use traits::CacheStore;

use crate::core::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a cache record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cached image's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Stable identifier, the canonical key
    pub id: RecordId,
    /// Human-readable title (not unique)
    pub title: String,
    /// Free-form explanation of the image
    pub description: String,
    /// Where the image bytes live on disk
    pub file_path: PathBuf,
    /// Digest of the image bytes, the deduplication key
    pub fingerprint: Fingerprint,
}

/// Fields supplied when inserting a record; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub title: String,
    pub description: String,
    pub file_path: PathBuf,
    pub fingerprint: Fingerprint,
}

impl NewRecord {
    fn into_record(self, id: RecordId) -> CacheRecord {
        CacheRecord {
            id,
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            fingerprint: self.fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint;

    #[test]
    fn new_record_keeps_fields() {
        let new = NewRecord {
            title: "Horsehead Nebula".to_string(),
            description: "Dark nebula in Orion".to_string(),
            file_path: PathBuf::from("/cache/Horsehead_Nebula.jpg"),
            fingerprint: fingerprint(b"horsehead"),
        };

        let record = new.clone().into_record(RecordId(7));

        assert_eq!(record.id, RecordId(7));
        assert_eq!(record.title, new.title);
        assert_eq!(record.description, new.description);
        assert_eq!(record.file_path, new.file_path);
        assert_eq!(record.fingerprint, new.fingerprint);
    }

    #[test]
    fn record_serializes_with_plain_id() {
        let record = CacheRecord {
            id: RecordId(3),
            title: "M42".to_string(),
            description: String::new(),
            file_path: PathBuf::from("/cache/M42.jpg"),
            fingerprint: fingerprint(b"m42"),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["fingerprint"], record.fingerprint.as_str());
    }
}
