//! Bootstrap components
//!
//! This module provides functionality for the first-start bootstrap:
//! - Reading and validating the bootstrap configuration
//! - The bootstrap operation itself
//! - Waiting out an unavailable store

mod config;
mod initializer;
mod retry;

pub use config::{BootstrapConfig, DuplicatePolicy, DEFAULT_ROLE};
pub use initializer::{bootstrap, Outcome};
pub use retry::{bootstrap_with_retry, RetryPolicy};
