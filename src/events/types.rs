//! Event type definitions for cache activity reporting.

use crate::core::store::RecordId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the cache manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Image ingestion events
    Cache(CacheEvent),
    /// Integrity check events
    Verify(VerifyEvent),
}

/// Events while ensuring an image is cached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheEvent {
    /// The image content was already cached; nothing was written
    Hit { id: RecordId, fingerprint: String },
    /// The image was written to disk and a record inserted
    Stored {
        id: RecordId,
        path: PathBuf,
        size_bytes: u64,
    },
    /// Another writer inserted the same content first
    RaceLost { id: RecordId, fingerprint: String },
    /// The image could not be written; no record was inserted
    WriteFailed { path: PathBuf, message: String },
}

/// Events while checking cached files against their records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerifyEvent {
    /// Checking has started
    Started { total_records: usize },
    /// A record points at a file that no longer exists
    Missing { id: RecordId, path: PathBuf },
    /// A record's file no longer matches its fingerprint
    Mismatch { id: RecordId, path: PathBuf },
    /// Checking completed
    Completed { checked: usize, problems: usize },
}
