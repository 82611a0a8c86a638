//! # Core Module
//!
//! The GUI-agnostic image cache.
//!
//! ## Modules
//! - `fingerprint` - Content digests used as the deduplication key
//! - `paths` - Safe file names derived from titles and source URLs
//! - `store` - Metadata records, one per distinct image
//! - `manager` - Orchestrates writing files and inserting records

pub mod fingerprint;
pub mod manager;
pub mod paths;
pub mod store;

// Re-export commonly used types
pub use fingerprint::Fingerprint;
pub use manager::{CacheConfig, CacheManager};
pub use store::{CacheRecord, CacheStore, RecordId};
