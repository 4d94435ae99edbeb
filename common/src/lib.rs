//! Shared utilities for mongo-init components
//!
//! This crate provides common functionality used by the bootstrap binary:
//! - Structured logging initialization
//! - Environment variable and secret file parsing helpers
//! - Command execution utilities
//! - Telemetry for reporting bootstrap events

pub mod command;
pub mod config;
pub mod logging;
pub mod telemetry;

pub use command::{run_with_stdin, CommandOutput};
pub use config::{read_secret_file, ConfigExt};
pub use logging::init_logging;
pub use telemetry::{Telemetry, TelemetryEvent};
