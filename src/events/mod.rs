//! # Events Module
//!
//! Reports what the cache manager did (hit, stored, write failed) to any
//! UI layer that cares, over a channel.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! let manager = CacheManager::open(&config)?.with_events(sender);
//!
//! manager.ensure_cached(&bytes, title, description, url)?;
//! for event in receiver.drain() {
//!     if let Event::Cache(CacheEvent::Hit { id, .. }) = event {
//!         println!("already cached as #{id}");
//!     }
//! }
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
