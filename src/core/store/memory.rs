//! In-memory store backend for testing.

use super::{CacheRecord, CacheStore, NewRecord, RecordId};
use crate::core::fingerprint::Fingerprint;
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

/// In-memory store backend
///
/// Useful for testing and scenarios where persistence isn't needed.
pub struct InMemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    records: BTreeMap<RecordId, CacheRecord>,
    last_id: i64,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryStore {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state
            .records
            .values()
            .find(|r| &r.fingerprint == fingerprint)
            .cloned())
    }

    fn find_by_path(&self, path: &Path) -> Result<Option<CacheRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state.records.values().find(|r| r.file_path == path).cloned())
    }

    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        // Single write lock makes check-and-insert atomic
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;

        if state.records.values().any(|r| r.fingerprint == record.fingerprint) {
            return Err(StoreError::DuplicateFingerprint {
                fingerprint: record.fingerprint.to_string(),
            });
        }
        if state.records.values().any(|r| r.file_path == record.file_path) {
            return Err(StoreError::DuplicatePath {
                path: record.file_path,
            });
        }

        state.last_id += 1;
        let id = RecordId(state.last_id);
        state.records.insert(id, record.into_record(id));

        Ok(id)
    }

    fn get_by_id(&self, id: RecordId) -> Result<Option<CacheRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state.records.get(&id).cloned())
    }

    fn get_by_title(&self, title: &str) -> Result<Option<CacheRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        // BTreeMap iterates in id order, so the first match has the lowest id
        Ok(state.records.values().find(|r| r.title == title).cloned())
    }

    fn list_titles(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state.records.values().map(|r| r.title.clone()).collect())
    }

    fn records(&self) -> Result<Vec<CacheRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state.records.values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;

        Ok(state.records.len())
    }
}
