//! Related-record event mapping.
//!
//! A change on a related record fans out to every managed record that
//! references it. [`StoreRelatedMapper`] computes the dependents;
//! [`RelatedEventHandler`] decides which watch events are worth mapping.

mod handler;
mod related;

pub use handler::RelatedEventHandler;
pub use related::StoreRelatedMapper;
