//! In-memory record stores.
//!
//! These implement the store side of the controller's contracts for
//! embedding and tests. Every mutation is published on a broadcast watch
//! feed, which is what the controller runtime subscribes to.

mod in_memory;
mod related;

pub use in_memory::InMemoryRecordStore;
pub use related::InMemoryRelatedStore;

/// Capacity of each store's watch feed.
pub const WATCH_CAPACITY: usize = 1024;
