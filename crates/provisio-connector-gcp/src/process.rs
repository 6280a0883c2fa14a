//! Subprocess execution shared by the CLI-backed collaborators.
//!
//! Stdout is the structured channel and is returned untouched; stderr is
//! diagnostics only and is never parsed for data.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use provisio_core::error::{ReconcileError, ReconcileResult};

/// Captured output of a finished command.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Run `program args...` and wait for it, bounded by `limit`.
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    limit: Duration,
) -> ReconcileResult<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    debug!(program, ?args, "running command");
    let child = cmd.spawn().map_err(|e| {
        ReconcileError::unavailable_with_source(format!("failed to start '{program}'"), e)
    })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ReconcileError::unavailable_with_source(
                format!("failed to wait for '{program}'"),
                e,
            ))
        }
        Err(_) => {
            warn!(program, timeout_secs = limit.as_secs(), "command timed out");
            return Err(ReconcileError::unavailable(format!(
                "'{program}' timed out after {}s",
                limit.as_secs()
            )));
        }
    };

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        code: output.status.code(),
    };
    if !result.stderr.is_empty() {
        trace!(program, stderr = %result.stderr, "command diagnostics");
    }
    Ok(result)
}

impl CommandOutput {
    /// Turn a failed run into `StoreUnavailable`, keeping stderr verbatim.
    pub(crate) fn into_failure(self, program: &str) -> ReconcileError {
        let code = self
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        ReconcileError::unavailable(format!(
            "'{program}' exited with {code}:\n{}",
            self.stderr.trim_end()
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_separately() {
        let output = run_command(
            "sh",
            &["-c", "echo '{\"a\":1}'; echo noise >&2"],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "{\"a\":1}");
        assert_eq!(output.stderr.trim(), "noise");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let err = run_command(
            "/nonexistent/provisio-test-binary",
            &[],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let err = run_command("sh", &["-c", "sleep 5"], None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_failure_keeps_stderr() {
        let output = run_command("sh", &["-c", "echo 'permission denied' >&2; exit 2"], None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!output.success);
        let err = output.into_failure("sh");
        assert!(err.to_string().contains("exited with 2"));
        assert!(err.to_string().contains("permission denied"));
    }
}
