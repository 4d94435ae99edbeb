//! First-start bootstrap for MongoDB
//!
//! Selects a target database and provisions one administrative user holding
//! a single grant on it. Run once, before the store takes application
//! traffic; safe to re-run.

pub mod bootstrap;
pub mod error;
pub mod store;

pub use bootstrap::{bootstrap, bootstrap_with_retry, BootstrapConfig, DuplicatePolicy, Outcome, RetryPolicy};
pub use error::BootstrapError;
pub use store::{DatabaseHandle, Grant, MongoShell, NewUser, Role, Store, StoreConfig, StoreError};
