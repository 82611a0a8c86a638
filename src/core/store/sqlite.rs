//! SQLite store backend for persistent storage.

use super::{CacheRecord, CacheStore, NewRecord, RecordId};
use crate::core::fingerprint::Fingerprint;
use crate::error::StoreError;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// File name of the metadata database inside the cache directory
pub const DATABASE_FILE_NAME: &str = "image_cache.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, title, description, file_path, fingerprint FROM image_cache";

/// SQLite-backed persistent store
///
/// Uses WAL (Write-Ahead Logging) mode so readers proceed while a write
/// is in flight. Uniqueness of fingerprints and file paths is enforced by
/// the schema itself, which makes every insert an atomic check-and-insert
/// even across processes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create the store inside `base_directory` if absent, then open it.
    ///
    /// Calling this on an existing cache is a no-op apart from opening it.
    pub fn initialize(base_directory: &Path) -> Result<Self, StoreError> {
        Self::open(&base_directory.join(DATABASE_FILE_NAME))
    }

    /// Open or create a store database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| classify(e, path))?;

        // The first statement is where SQLite notices a file that isn't a database
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| classify(e, path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS image_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                file_path TEXT NOT NULL UNIQUE,
                fingerprint TEXT NOT NULL UNIQUE
            )",
            [],
        )
        .map_err(|e| classify(e, path))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_image_cache_title ON image_cache(title)",
            [],
        )
        .map_err(|e| classify(e, path))?;

        debug!(path = %path.display(), "opened image cache database");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn query_one(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<CacheRecord>, StoreError> {
        let conn = self.lock()?;

        let raw = conn
            .query_row(sql, [param], RawRecord::from_row)
            .optional()
            .map_err(|e| classify(e, &self.db_path))?;

        raw.map(RawRecord::into_record).transpose()
    }
}

/// A row as stored, before validation
struct RawRecord {
    id: i64,
    title: String,
    description: String,
    file_path: String,
    fingerprint: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            file_path: row.get(3)?,
            fingerprint: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<CacheRecord, StoreError> {
        let fingerprint = self
            .fingerprint
            .parse::<Fingerprint>()
            .map_err(|e| StoreError::InvalidRow {
                id: self.id,
                reason: e.to_string(),
            })?;

        Ok(CacheRecord {
            id: RecordId(self.id),
            title: self.title,
            description: self.description,
            file_path: PathBuf::from(self.file_path),
            fingerprint,
        })
    }
}

/// Map a SQLite error, recognising a corrupt or foreign database file
fn classify(error: rusqlite::Error, path: &Path) -> StoreError {
    match error {
        rusqlite::Error::SqliteFailure(ref e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            StoreError::Corrupted {
                path: path.to_path_buf(),
            }
        }
        other => StoreError::QueryFailed(other.to_string()),
    }
}

impl CacheStore for SqliteStore {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE fingerprint = ?");
        self.query_one(&sql, &fingerprint.as_str())
    }

    fn find_by_path(&self, path: &Path) -> Result<Option<CacheRecord>, StoreError> {
        // Only UTF-8 paths can ever be inserted
        let Some(path) = path.to_str() else {
            return Ok(None);
        };
        let sql = format!("{SELECT_COLUMNS} WHERE file_path = ?");
        self.query_one(&sql, &path)
    }

    fn insert(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let file_path = record.file_path.to_str().ok_or_else(|| {
            StoreError::QueryFailed(format!(
                "file path is not valid UTF-8: {}",
                record.file_path.display()
            ))
        })?;

        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO image_cache (title, description, file_path, fingerprint)
             VALUES (?, ?, ?, ?)",
            params![
                record.title,
                record.description,
                file_path,
                record.fingerprint.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(RecordId(conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(e, Some(message)))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                if message.contains("image_cache.fingerprint") {
                    Err(StoreError::DuplicateFingerprint {
                        fingerprint: record.fingerprint.to_string(),
                    })
                } else if message.contains("image_cache.file_path") {
                    Err(StoreError::DuplicatePath {
                        path: record.file_path.clone(),
                    })
                } else {
                    Err(StoreError::QueryFailed(message))
                }
            }
            Err(e) => Err(classify(e, &self.db_path)),
        }
    }

    fn get_by_id(&self, id: RecordId) -> Result<Option<CacheRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        self.query_one(&sql, &id.0)
    }

    fn get_by_title(&self, title: &str) -> Result<Option<CacheRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE title = ? ORDER BY id ASC LIMIT 1");
        self.query_one(&sql, &title)
    }

    fn list_titles(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT title FROM image_cache ORDER BY id ASC")
            .map_err(|e| classify(e, &self.db_path))?;

        let titles = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| classify(e, &self.db_path))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| classify(e, &self.db_path))?;

        Ok(titles)
    }

    fn records(&self) -> Result<Vec<CacheRecord>, StoreError> {
        let conn = self.lock()?;

        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql).map_err(|e| classify(e, &self.db_path))?;

        let raw = stmt
            .query_map([], RawRecord::from_row)
            .map_err(|e| classify(e, &self.db_path))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| classify(e, &self.db_path))?;

        raw.into_iter().map(RawRecord::into_record).collect()
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;

        conn.query_row("SELECT COUNT(*) FROM image_cache", [], |row| {
            row.get::<_, i64>(0).map(|v| v as usize)
        })
        .map_err(|e| classify(e, &self.db_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint;
    use tempfile::TempDir;

    fn new_record(dir: &Path, title: &str, content: &[u8]) -> NewRecord {
        NewRecord {
            title: title.to_string(),
            description: format!("About {title}"),
            file_path: dir.join(format!("{title}-{}.jpg", content.len())),
            fingerprint: fingerprint(content),
        }
    }

    #[test]
    fn initialize_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("images");

        let store = SqliteStore::initialize(&base).unwrap();

        assert!(base.join(DATABASE_FILE_NAME).exists());
        assert_eq!(store.path(), base.join(DATABASE_FILE_NAME));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();

        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        let id = store
            .insert(new_record(temp_dir.path(), "Vega", b"vega"))
            .unwrap();
        drop(store);

        let reopened = SqliteStore::initialize(temp_dir.path()).unwrap();
        let record = reopened.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.title, "Vega");
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn stores_and_retrieves() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        let new = new_record(temp_dir.path(), "Crab Nebula", b"crab");

        let id = store.insert(new.clone()).unwrap();

        let by_fp = store.find_by_fingerprint(&new.fingerprint).unwrap().unwrap();
        assert_eq!(by_fp.id, id);
        assert_eq!(by_fp.title, new.title);
        assert_eq!(by_fp.description, new.description);
        assert_eq!(by_fp.file_path, new.file_path);
        assert_eq!(store.get_by_id(id).unwrap(), Some(by_fp));
    }

    #[test]
    fn missing_lookups_return_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();

        assert!(store.find_by_fingerprint(&fingerprint(b"x")).unwrap().is_none());
        assert!(store.get_by_id(RecordId(42)).unwrap().is_none());
        assert!(store.get_by_title("Nope").unwrap().is_none());
        assert!(store.list_titles().unwrap().is_empty());
    }

    #[test]
    fn rejects_duplicate_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        store.insert(new_record(temp_dir.path(), "Sirius", b"sirius")).unwrap();

        let mut again = new_record(temp_dir.path(), "Dog Star", b"sirius");
        again.file_path = temp_dir.path().join("elsewhere.jpg");
        let err = store.insert(again).unwrap_err();

        assert!(matches!(err, StoreError::DuplicateFingerprint { .. }));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn rejects_duplicate_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        let first = new_record(temp_dir.path(), "Moon", b"moon-a");
        let path = first.file_path.clone();
        store.insert(first).unwrap();

        let mut clash = new_record(temp_dir.path(), "Moon", b"moon-b");
        clash.file_path = path.clone();
        let err = store.insert(clash).unwrap_err();

        match err {
            StoreError::DuplicatePath { path: reported } => assert_eq!(reported, path),
            other => panic!("expected DuplicatePath, got {other:?}"),
        }
    }

    #[test]
    fn find_by_path_returns_owner() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        let new = new_record(temp_dir.path(), "Altair", b"altair");
        let path = new.file_path.clone();
        let id = store.insert(new).unwrap();

        assert_eq!(store.find_by_path(&path).unwrap().unwrap().id, id);
        assert!(store
            .find_by_path(&temp_dir.path().join("Altair-7.png"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn titles_in_insertion_order_and_lowest_id_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();

        let first = store.insert(new_record(temp_dir.path(), "Aurora", b"a1")).unwrap();
        store.insert(new_record(temp_dir.path(), "Comet", b"c")).unwrap();
        store.insert(new_record(temp_dir.path(), "Aurora", b"a22")).unwrap();

        assert_eq!(store.list_titles().unwrap(), vec!["Aurora", "Comet", "Aurora"]);
        assert_eq!(store.get_by_title("Aurora").unwrap().unwrap().id, first);
        assert_eq!(store.records().unwrap().len(), 3);
    }

    #[test]
    fn ids_are_never_reused() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();
        let first = store.insert(new_record(temp_dir.path(), "Io", b"io")).unwrap();
        let second = store.insert(new_record(temp_dir.path(), "Europa", b"europa")).unwrap();

        // Remove the newest row behind the store's back
        let raw = Connection::open(store.path()).unwrap();
        raw.execute("DELETE FROM image_cache WHERE id = ?", [second.0]).unwrap();
        drop(raw);

        let third = store.insert(new_record(temp_dir.path(), "Ganymede", b"ganymede")).unwrap();
        assert!(third > second);
        assert!(second > first);
    }

    #[test]
    fn garbage_file_is_reported_as_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join(DATABASE_FILE_NAME);
        std::fs::write(&db_path, b"this is not a database ".repeat(200)).unwrap();

        let err = SqliteStore::open(&db_path).err().unwrap();

        assert!(matches!(err, StoreError::Corrupted { .. }), "got {err:?}");
    }

    #[test]
    fn invalid_fingerprint_row_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::initialize(temp_dir.path()).unwrap();

        let raw = Connection::open(store.path()).unwrap();
        raw.execute(
            "INSERT INTO image_cache (title, description, file_path, fingerprint)
             VALUES ('Bad', '', '/cache/bad.jpg', 'not-hex')",
            [],
        )
        .unwrap();
        drop(raw);

        let err = store.get_by_title("Bad").unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { .. }));
        assert!(store.records().is_err());
    }
}
