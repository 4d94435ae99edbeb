//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration from environment variables
//! and from secret files mounted by the orchestrator.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars with defaults, secrets
/// and type parsing.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// A variable that is set but empty is returned as-is, so callers can
    /// reject it during validation.
    ///
    /// # Example
    /// ```ignore
    /// let role = String::env_or("MONGO_INIT_ROLE", "readWrite");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    ///
    /// # Example
    /// ```ignore
    /// let retries: u32 = u32::env_parse("MONGO_INIT_MAX_RETRIES", 30);
    /// ```
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get a secret from `<name>_FILE` (a mounted secret) or `<name>`.
    ///
    /// The file variant wins when both are set. Returns `Ok(None)` when
    /// neither is set, and an error if the named file cannot be read.
    fn env_secret(name: &str) -> Result<Option<String>> {
        let file_var = format!("{}_FILE", name);
        if let Ok(path) = env::var(&file_var) {
            return read_secret_file(&path)
                .with_context(|| format!("{} points to an unreadable file", file_var))
                .map(Some);
        }
        Ok(env::var(name).ok())
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

/// Read a secret file, dropping the trailing newline editors and
/// `echo` leave behind.
pub fn read_secret_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret file {}", path.display()))?;
    Ok(content.trim_end_matches(['\n', '\r']).to_string())
}
