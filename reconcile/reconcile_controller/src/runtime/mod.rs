//! Controller runtime.
//!
//! Wires watch feeds into a [`WorkQueue`](crate::queue::WorkQueue) and runs
//! a bounded pool of workers that feed queued keys to the
//! [`Reconciler`](crate::reconciler::Reconciler).

mod builder;
mod controller;

pub use builder::ControllerBuilder;
pub use controller::Controller;
