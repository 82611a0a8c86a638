//! # APOD Cache
//!
//! Local cache for Astronomy Picture of the Day images.
//!
//! ## Guarantees
//! - **One copy per image** - content is deduplicated by SHA-256 fingerprint
//! - **No dangling records** - a record is only inserted once its file is in place
//! - **Safe names** - titles can never steer a file outside the cache directory
//!
//! ## Architecture
//! - `core` - Fingerprinting, path derivation, metadata store, cache manager
//! - `events` - Event-driven activity reporting (GUI-ready)
//! - `error` - Typed errors that keep failure causes apart
//!
//! Fetching the image, displaying it, and setting it as the desktop
//! background happen outside this crate; the cache only sees bytes in and
//! hands file paths out.

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{ApodCacheError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber installed earlier (e.g. by a test harness) wins
    let _ = tracing::subscriber::set_global_default(subscriber);
}
