//! Cache manager implementation.

use super::CacheConfig;
use crate::core::fingerprint::{fingerprint, Fingerprint};
use crate::core::paths::{derive_path, derive_path_with_suffix};
use crate::core::store::{CacheRecord, CacheStore, NewRecord, RecordId, SqliteStore};
use crate::error::{ApodCacheError, Result, StoreError, WriteError};
use crate::events::{null_sender, CacheEvent, Event, EventSender, VerifyEvent};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hex characters of the fingerprint used to disambiguate clashing titles
const SUFFIX_LEN: usize = 12;

/// Numbered names tried after the fingerprint-suffixed one
const MAX_NUMBERED_CANDIDATES: usize = 32;

const TEMP_PREFIX: &str = ".apod-";
const TEMP_SUFFIX: &str = ".part";

/// Temp files older than this are leftovers of a crashed write
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Summary of what the cache holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of records
    pub total_records: usize,
    /// Combined size of the image files that exist on disk
    pub total_size_bytes: u64,
    /// Records whose file is missing
    pub missing_files: usize,
}

/// Result of checking every record against its file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Records checked
    pub checked: usize,
    /// Records whose file no longer exists
    pub missing: Vec<CacheRecord>,
    /// Records whose file content no longer matches the fingerprint
    pub mismatched: Vec<CacheRecord>,
}

impl VerifyReport {
    /// True when every record points at intact content
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

/// Ensures images are cached exactly once and hands out their records.
///
/// Holds the image directory and the metadata store explicitly; nothing is
/// global. Safe to share between threads.
pub struct CacheManager {
    cache_directory: PathBuf,
    store: Box<dyn CacheStore>,
    events: EventSender,
    // Serializes the miss path so two same-content calls in this process
    // never both write a file
    ingest_lock: Mutex<()>,
}

impl CacheManager {
    /// Manager over an already opened store
    pub fn new(cache_directory: impl Into<PathBuf>, store: Box<dyn CacheStore>) -> Self {
        Self {
            cache_directory: cache_directory.into(),
            store,
            events: null_sender(),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Initialize the cache described by `config` and open it.
    ///
    /// Creates the image directory and the database if they are absent.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        fs::create_dir_all(&config.cache_directory).map_err(|source| WriteError::CreateDirectory {
            path: config.cache_directory.clone(),
            source,
        })?;
        let store = SqliteStore::open(&config.database_path)?;

        let manager = Self::new(config.cache_directory.clone(), Box::new(store));
        manager.remove_stale_temp_files(STALE_TEMP_AGE);
        Ok(manager)
    }

    /// Report activity to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = sender;
        self
    }

    /// Directory holding the cached image files
    pub fn cache_directory(&self) -> &Path {
        &self.cache_directory
    }

    /// Make sure `image_bytes` are cached and return the id of their record.
    ///
    /// A cache hit returns the existing id without touching the disk. On a
    /// miss the bytes are written under a name derived from `title` and the
    /// extension of `source_url`, and only then is a record inserted. If the
    /// write fails no record exists afterwards.
    pub fn ensure_cached(
        &self,
        image_bytes: &[u8],
        title: &str,
        description: &str,
        source_url: &str,
    ) -> Result<RecordId> {
        let fp = fingerprint(image_bytes);

        if let Some(existing) = self.store.find_by_fingerprint(&fp)? {
            return Ok(self.hit(existing));
        }

        let _guard = self.ingest_lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        // Another thread may have finished the same image while we waited
        if let Some(existing) = self.store.find_by_fingerprint(&fp)? {
            return Ok(self.hit(existing));
        }

        let placed = match self.write_image(image_bytes, title, source_url, &fp) {
            Ok(placed) => placed,
            Err(ApodCacheError::Write(e)) => {
                warn!(error = %e, "failed to write image to cache");
                self.events.send(Event::Cache(CacheEvent::WriteFailed {
                    path: e.path().clone(),
                    message: e.to_string(),
                }));
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };
        let path = placed.path.clone();

        let record = NewRecord {
            title: title.to_string(),
            description: description.to_string(),
            file_path: path.clone(),
            fingerprint: fp.clone(),
        };

        match self.store.insert(record) {
            Ok(id) => {
                info!(%id, path = %path.display(), "cached new image");
                self.events.send(Event::Cache(CacheEvent::Stored {
                    id,
                    path,
                    size_bytes: image_bytes.len() as u64,
                }));
                Ok(id)
            }
            Err(StoreError::DuplicateFingerprint { .. }) => {
                // Another process inserted the same content first
                let winner = self.store.find_by_fingerprint(&fp)?.ok_or_else(|| {
                    StoreError::QueryFailed(format!("record for {fp} vanished after insert conflict"))
                })?;
                if winner.file_path != path {
                    discard(&path);
                }
                debug!(id = %winner.id, "lost insert race, using existing record");
                self.events.send(Event::Cache(CacheEvent::RaceLost {
                    id: winner.id,
                    fingerprint: fp.to_string(),
                }));
                Ok(winner.id)
            }
            Err(e) => {
                // Only a file this call created is ours to remove
                if placed.created {
                    discard(&path);
                }
                Err(e.into())
            }
        }
    }

    /// Record by id, the canonical key
    pub fn get_by_id(&self, id: RecordId) -> Result<Option<CacheRecord>> {
        Ok(self.store.get_by_id(id)?)
    }

    /// Record by title; the lowest id wins when titles repeat
    pub fn get_by_title(&self, title: &str) -> Result<Option<CacheRecord>> {
        Ok(self.store.get_by_title(title)?)
    }

    /// Titles in insertion order, for selection lists
    pub fn list_titles(&self) -> Result<Vec<String>> {
        Ok(self.store.list_titles()?)
    }

    /// All records in insertion order
    pub fn records(&self) -> Result<Vec<CacheRecord>> {
        Ok(self.store.records()?)
    }

    /// File to hand to a desktop background setter.
    ///
    /// `None` if no such record exists; an error if the record's file is gone.
    pub fn background_path(&self, id: RecordId) -> Result<Option<PathBuf>> {
        let Some(record) = self.store.get_by_id(id)? else {
            return Ok(None);
        };

        if !record.file_path.is_file() {
            return Err(ApodCacheError::Read {
                path: record.file_path,
                source: io::Error::new(io::ErrorKind::NotFound, "cached image file is missing"),
            });
        }

        Ok(Some(record.file_path))
    }

    /// Count records and measure their files
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();

        for record in self.store.records()? {
            stats.total_records += 1;
            match fs::metadata(&record.file_path) {
                Ok(meta) if meta.is_file() => stats.total_size_bytes += meta.len(),
                _ => stats.missing_files += 1,
            }
        }

        Ok(stats)
    }

    /// Re-hash every cached file and report records that no longer hold.
    pub fn verify(&self) -> Result<VerifyReport> {
        let records = self.store.records()?;
        self.events.send(Event::Verify(VerifyEvent::Started {
            total_records: records.len(),
        }));

        let mut report = VerifyReport {
            checked: records.len(),
            ..VerifyReport::default()
        };

        for record in records {
            match Fingerprint::of_file(&record.file_path) {
                Ok(actual) if actual == record.fingerprint => {}
                Ok(_) => {
                    warn!(id = %record.id, path = %record.file_path.display(), "cached file content changed");
                    self.events.send(Event::Verify(VerifyEvent::Mismatch {
                        id: record.id,
                        path: record.file_path.clone(),
                    }));
                    report.mismatched.push(record);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(id = %record.id, path = %record.file_path.display(), "cached file missing");
                    self.events.send(Event::Verify(VerifyEvent::Missing {
                        id: record.id,
                        path: record.file_path.clone(),
                    }));
                    report.missing.push(record);
                }
                Err(source) => {
                    return Err(ApodCacheError::Read {
                        path: record.file_path,
                        source,
                    })
                }
            }
        }

        self.events.send(Event::Verify(VerifyEvent::Completed {
            checked: report.checked,
            problems: report.missing.len() + report.mismatched.len(),
        }));

        Ok(report)
    }

    /// Remove temp files left behind by writes that never finished.
    ///
    /// Returns how many were removed. Files younger than `older_than` may
    /// belong to a write still in progress and are kept.
    pub fn remove_stale_temp_files(&self, older_than: Duration) -> usize {
        let Ok(entries) = fs::read_dir(&self.cache_directory) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(TEMP_PREFIX) || !name.ends_with(TEMP_SUFFIX) {
                continue;
            }

            let stale = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(|modified| modified.elapsed().is_ok_and(|age| age >= older_than))
                .unwrap_or(false);
            if !stale {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale temp file"),
            }
        }

        if removed > 0 {
            info!(removed, "removed stale temp files from cache directory");
        }
        removed
    }

    fn hit(&self, existing: CacheRecord) -> RecordId {
        debug!(id = %existing.id, "image already cached");
        self.events.send(Event::Cache(CacheEvent::Hit {
            id: existing.id,
            fingerprint: existing.fingerprint.to_string(),
        }));
        existing.id
    }

    /// Write bytes to a temp file and rename it into place.
    ///
    /// Candidate names are tried in order: the plain title-derived name, the
    /// name with the fingerprint prefix appended, then numbered variants of
    /// that. A name is skipped if a record owns it or if a file with other
    /// content sits there. A file with the same content and no owner is
    /// adopted as-is.
    fn write_image(
        &self,
        bytes: &[u8],
        title: &str,
        source_url: &str,
        fp: &Fingerprint,
    ) -> Result<Placed> {
        let dir = &self.cache_directory;

        fs::create_dir_all(dir).map_err(|source| WriteError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;

        let mut tmp: Option<tempfile::NamedTempFile> = None;
        let mut last_candidate = None;

        for candidate in candidate_paths(dir, title, source_url, fp) {
            if let Some(owner) = self.store.find_by_path(&candidate)? {
                debug!(path = %candidate.display(), owner = %owner.id, "name belongs to another record");
                last_candidate = Some(candidate);
                continue;
            }

            if fs::symlink_metadata(&candidate).is_ok() {
                // Leftover from an interrupted run: same bytes, no record
                if candidate.is_file() && Fingerprint::of_file(&candidate).is_ok_and(|existing| &existing == fp) {
                    debug!(path = %candidate.display(), "adopting existing file with matching content");
                    return Ok(Placed {
                        path: candidate,
                        created: false,
                    });
                }
                debug!(path = %candidate.display(), "name taken by an unrecorded file");
                last_candidate = Some(candidate);
                continue;
            }

            let file = match tmp.take() {
                Some(file) => file,
                None => write_temp_file(dir, bytes, &candidate)?,
            };

            match file.persist_noclobber(&candidate) {
                Ok(_) => {
                    return Ok(Placed {
                        path: candidate,
                        created: true,
                    })
                }
                // Someone else claimed the name since we looked
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tmp = Some(e.file);
                    last_candidate = Some(candidate);
                }
                Err(e) => {
                    return Err(WriteError::Persist {
                        path: candidate,
                        source: e.error,
                    }
                    .into())
                }
            }
        }

        Err(WriteError::Persist {
            path: last_candidate.unwrap_or_else(|| derive_path(dir, title, source_url)),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "every candidate file name is taken"),
        }
        .into())
    }
}

/// Where `write_image` put the bytes
struct Placed {
    path: PathBuf,
    /// False when an existing file with the same content was adopted
    created: bool,
}

/// File names to try for an image, most preferred first
fn candidate_paths<'a>(
    dir: &'a Path,
    title: &'a str,
    source_url: &'a str,
    fp: &'a Fingerprint,
) -> impl Iterator<Item = PathBuf> + 'a {
    let short = fp.short(SUFFIX_LEN);
    let numbered = (2..MAX_NUMBERED_CANDIDATES + 2)
        .map(move |n| derive_path_with_suffix(dir, title, source_url, &format!("{short}_{n}")));

    [
        derive_path(dir, title, source_url),
        derive_path_with_suffix(dir, title, source_url, short),
    ]
    .into_iter()
    .chain(numbered)
}

fn write_temp_file(
    dir: &Path,
    bytes: &[u8],
    destination: &Path,
) -> std::result::Result<tempfile::NamedTempFile, WriteError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|source| WriteError::TempFile {
            path: dir.to_path_buf(),
            source,
        })?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| WriteError::Write {
            path: destination.to_path_buf(),
            source,
        })?;

    Ok(tmp)
}

/// Best-effort removal of a file written for a record that was never inserted
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove unrecorded image");
    }
}
