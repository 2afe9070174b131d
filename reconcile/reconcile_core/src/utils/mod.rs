//! Configuration and logging utilities.

pub mod config;
pub mod logging;

pub use config::{BackoffConfig, ControllerConfig};
pub use logging::{init_logging, LogLevel, LoggingConfig};
