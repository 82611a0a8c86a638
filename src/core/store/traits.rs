//! Store backend trait definition.

use super::{CacheRecord, NewRecord, RecordId};
use crate::core::fingerprint::Fingerprint;
use crate::error::StoreError;
use std::path::Path;

/// Trait for metadata store backends
pub trait CacheStore: Send + Sync {
    /// Look up the record holding the given content, if any
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, StoreError>;

    /// Look up the record that owns the given file path, if any
    fn find_by_path(&self, path: &Path) -> Result<Option<CacheRecord>, StoreError>;

    /// Insert a new record and return its freshly assigned id.
    ///
    /// Fails with `StoreError::DuplicateFingerprint` if the content is
    /// already cached and `StoreError::DuplicatePath` if the file path is
    /// already claimed. The check and the insert happen atomically.
    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError>;

    /// Look up a record by id
    fn get_by_id(&self, id: RecordId) -> Result<Option<CacheRecord>, StoreError>;

    /// Look up a record by title.
    ///
    /// Titles are not unique; when several records share one the record
    /// with the lowest id is returned.
    fn get_by_title(&self, title: &str) -> Result<Option<CacheRecord>, StoreError>;

    /// All titles in insertion order
    fn list_titles(&self) -> Result<Vec<String>, StoreError>;

    /// All records in insertion order
    fn records(&self) -> Result<Vec<CacheRecord>, StoreError>;

    /// Number of records
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records()?.len())
    }
}
