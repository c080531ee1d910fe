//! External tool invocation.
//!
//! A missing binary is an expected outcome on most hosts, so it is
//! reported as `Ok(None)` rather than an error.

use std::io::ErrorKind;
use std::process::Output;

use tokio::process::Command;

use crate::error::{DiscoverError, Result};

/// Run `program` with `args` and capture its output.
///
/// The child is killed if the returned future is dropped, so wrapping the
/// call in a timeout cancels the process too.
pub async fn run_tool(program: &str, args: &[&str]) -> Result<Option<Output>> {
    let result = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(tool = %program, "Tool not installed");
            Ok(None)
        }
        Err(e) => Err(DiscoverError::Io(e)),
    }
}

/// Stdout of a successful run, or `ToolFailed` with its stderr.
pub fn stdout_of(program: &str, output: &Output) -> Result<String> {
    if !output.status.success() {
        return Err(DiscoverError::ToolFailed {
            tool: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
