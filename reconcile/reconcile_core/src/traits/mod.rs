//! Contracts between the controller and its collaborators.
//!
//! The controller depends only on these traits. Each process wires exactly
//! one implementation of each, and tests substitute doubles.

pub mod diagnostics;
pub mod engine;
pub mod guard;
pub mod mapper;
pub mod store;

pub use diagnostics::DiagnosticSink;
pub use engine::ConvergenceEngine;
pub use guard::GuardManager;
pub use mapper::EventMapper;
pub use store::RecordStore;
