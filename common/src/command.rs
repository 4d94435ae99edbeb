//! Command execution utilities
//!
//! Provides consistent command execution with proper error handling and logging.

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Result of a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Exit code as text, `signal` when the process was killed.
    pub fn code_display(&self) -> String {
        self.code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

/// Run a command, feeding `input` on stdin, and return both stdout and stderr.
///
/// A non-zero exit is reported through `success`, not as an error. The
/// input never shows up in the process table the way arguments do, so
/// secrets go there. Arguments are logged, input is not.
///
/// # Example
/// ```ignore
/// let out = run_with_stdin("mongosh", &["--quiet", uri], script).await?;
/// ```
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run_with_stdin(cmd: &str, args: &[&str], input: &str) -> Result<CommandOutput> {
    debug!(args = ?args, input_len = input.len(), "Running command with stdin");

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context(format!("Failed to spawn {}", cmd))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .context(format!("Failed to write stdin of {}", cmd))?;
        // stdin is dropped here so the child sees EOF
    }

    let output = child
        .wait_with_output()
        .await
        .context(format!("Failed to wait for {}", cmd))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}
