//! Campaign errors
//!
//! Typed errors for each failure-prone boundary of a campaign. The binary
//! wraps them in `anyhow` with context at the orchestration edge.

use rpc_bench_common::{DaemonKind, TestSequenceStep};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors (all reported as usage errors)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command line did not match the positional form
    #[error("invalid arguments: {0}")]
    Usage(String),

    /// Resolved configuration failed validation
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    /// `--help` or `--version` was requested; not a failure
    #[error("{0}")]
    Display(clap::Error),
}

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for '{cmd}': {source}")]
    Wait {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{cmd}' timed out after {}s", .timeout.as_secs())]
    Timeout { cmd: String, timeout: Duration },
}

/// Daemon lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to launch {kind} ('{program}'): {source}")]
    Spawn {
        kind: DaemonKind,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The daemon process exited during its settling interval
    #[error("{kind} exited right after start with {status}")]
    StartFailed { kind: DaemonKind, status: ExitStatus },

    /// The daemon never accepted connections on its endpoint
    #[error("{kind} did not accept connections on {endpoint} within {}s", .timeout.as_secs())]
    NotReady {
        kind: DaemonKind,
        endpoint: String,
        timeout: Duration,
    },

    /// Mutual exclusion: the other daemon must be stopped first
    #[error("cannot start {requested} while {running} is running")]
    AlreadyRunning {
        requested: DaemonKind,
        running: DaemonKind,
    },

    #[cfg(unix)]
    #[error("failed to signal {kind} (pid {pid}): {source}")]
    Signal {
        kind: DaemonKind,
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("failed waiting for {kind} to exit: {source}")]
    Wait {
        kind: DaemonKind,
        #[source]
        source: std::io::Error,
    },

    /// The daemon died while runs were still planned against it
    #[error("{kind} exited during the campaign")]
    Exited { kind: DaemonKind },

    #[error("start of {kind} cancelled")]
    Cancelled { kind: DaemonKind },
}

/// Pattern-archive staging errors
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to copy pattern archive '{}' to '{}': {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("extracting '{}' failed with {status}", .archive.display())]
    Extract { archive: PathBuf, status: ExitStatus },
}

/// Load-generator errors for a single run
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator script '{}' not found", .path.display())]
    ScriptMissing { path: PathBuf },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("generator for {kind} at {step} exited with {status}")]
    Failed {
        kind: DaemonKind,
        step: TestSequenceStep,
        status: ExitStatus,
    },

    #[error("failed to remove stale generator report '{}': {source}", .path.display())]
    StaleReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result-parser errors for a single run
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("generator report '{}' does not exist", .path.display())]
    ReportMissing { path: PathBuf },

    #[error("generator report '{}' is malformed: {reason}", .path.display())]
    ReportMalformed { path: PathBuf, reason: String },

    #[error("failed to read generator report '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ReportMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single run (generator or parser side)
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Report-writer errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report '{}': {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
