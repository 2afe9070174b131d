//! Data structures shared by the controller and its collaborators.

pub mod diagnostic;
pub mod event;
pub mod lifecycle;
pub mod record;
pub mod related;

pub use diagnostic::Severity;
pub use event::{Keyed, WatchEvent};
pub use lifecycle::LifecycleState;
pub use record::{ManagedRecord, RelatedRef};
pub use related::{RelatedIdentity, RelatedRecord};
