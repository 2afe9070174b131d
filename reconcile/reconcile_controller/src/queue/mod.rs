//! Rate-limited work queue.
//!
//! The queue holds record keys, never record state. A key is queued at most
//! once at a time and handed to at most one worker at a time; a key added
//! while it is being processed is queued again when the worker is done.

mod backoff;
mod work_queue;

pub use backoff::ExponentialBackoff;
pub use work_queue::WorkQueue;
