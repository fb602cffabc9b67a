//! Shared command execution with streaming output
//!
//! Provides a command runner that forwards child output line by line to
//! `tracing`, so generator chatter shows up with `RUST_LOG=debug` without
//! cluttering the console by default.

use crate::error::CommandError;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Command timeout (kills process if exceeded)
    pub timeout: Duration,
    /// Time to wait for streaming tasks to flush after command completes
    pub stream_flush_timeout: Duration,
    /// Working directory of the child (inherits ours if unset)
    pub current_dir: Option<PathBuf>,
}

impl CommandConfig {
    /// Configuration for a load-generator run lasting `duration` plus `slack`
    pub fn for_generator(duration: Duration, slack: Duration) -> Self {
        Self {
            timeout: duration + slack,
            stream_flush_timeout: Duration::from_secs(2),
            current_dir: None,
        }
    }

    /// Configuration for short host probes and archive staging (10 minute timeout)
    pub fn for_setup() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            stream_flush_timeout: Duration::from_secs(2),
            current_dir: None,
        }
    }

    /// Run the child from `dir`
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

/// Run a command to completion, forwarding its output to `tracing`.
///
/// # Returns
/// * `Ok(status)` once the command exited (successfully or not)
/// * `Err` on spawn failure or timeout; a timed-out child is killed
pub async fn run_command_streaming(
    cmd: &str,
    args: &[String],
    config: &CommandConfig,
) -> Result<ExitStatus, CommandError> {
    info!(
        cmd = %cmd,
        args = ?args,
        timeout_secs = config.timeout.as_secs(),
        "Running command"
    );

    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.current_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| CommandError::Spawn {
        cmd: cmd.to_string(),
        source,
    })?;

    let stdout_handle = child
        .stdout
        .take()
        .map(|out| tokio::spawn(forward_lines(cmd.to_string(), "stdout", out)));
    let stderr_handle = child
        .stderr
        .take()
        .map(|err| tokio::spawn(forward_lines(cmd.to_string(), "stderr", err)));

    let status = match tokio::time::timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(source)) => {
            return Err(CommandError::Wait {
                cmd: cmd.to_string(),
                source,
            })
        }
        Err(_) => {
            warn!(
                cmd = %cmd,
                timeout_secs = config.timeout.as_secs(),
                "Command timed out, killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            return Err(CommandError::Timeout {
                cmd: cmd.to_string(),
                timeout: config.timeout,
            });
        }
    };

    for handle in [stdout_handle, stderr_handle].into_iter().flatten() {
        let _ = tokio::time::timeout(config.stream_flush_timeout, handle).await;
    }

    debug!(cmd = %cmd, %status, "Command finished");
    Ok(status)
}

/// Run a command and return the first line of its stdout, if it succeeded
pub async fn first_output_line(cmd: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let output = tokio::time::timeout(
        timeout,
        Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        debug!(cmd = %cmd, status = %output.status, "Probe command failed");
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Forward every line of a child stream to `tracing` at DEBUG
pub(crate) async fn forward_lines<R>(source: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "rpc_bench::child", source = %source, stream, "{}", line);
    }
}
