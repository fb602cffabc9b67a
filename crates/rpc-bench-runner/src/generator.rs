//! Load generation
//!
//! Each run executes `vegeta_attack_getLogs_<daemon>.sh <qps> <seconds>` from
//! the generator directory and waits for it. The script leaves its text report
//! next to itself; see [`crate::results::artifact_name`]. Report names only
//! depend on the step, so a report from an earlier campaign must be removed
//! before the run that would produce it.

use crate::command::{run_command_streaming, CommandConfig};
use crate::error::GeneratorError;
use crate::results::artifact_path;
use rpc_bench_common::{DaemonKind, TestSequenceStep};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Runs one load step against a daemon
#[allow(async_fn_in_trait)]
pub trait LoadGenerator {
    /// Where a run of `step` against `kind` leaves its report
    fn report_path(&self, kind: DaemonKind, step: TestSequenceStep) -> PathBuf;

    /// Drive `step` against `kind` until the generator exits
    async fn attack(&self, kind: DaemonKind, step: TestSequenceStep) -> Result<(), GeneratorError>;
}

/// Delete a report left at `path` by an earlier run; a missing file is fine
pub fn remove_stale_report(path: &Path) -> Result<(), GeneratorError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            warn!(path = %path.display(), "Removed stale generator report");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GeneratorError::StaleReport {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Per-daemon vegeta attack scripts in one directory
#[derive(Debug, Clone)]
pub struct VegetaScripts {
    dir: PathBuf,
    slack: Duration,
}

impl VegetaScripts {
    /// `slack` is added to each step's duration to form the run timeout
    pub fn new(dir: impl Into<PathBuf>, slack: Duration) -> Self {
        Self {
            dir: dir.into(),
            slack,
        }
    }

    pub fn script_path(&self, kind: DaemonKind) -> PathBuf {
        self.dir
            .join(format!("vegeta_attack_getLogs_{}.sh", kind.label()))
    }
}

impl LoadGenerator for VegetaScripts {
    fn report_path(&self, kind: DaemonKind, step: TestSequenceStep) -> PathBuf {
        artifact_path(&self.dir, step, kind)
    }

    async fn attack(&self, kind: DaemonKind, step: TestSequenceStep) -> Result<(), GeneratorError> {
        let script = self.script_path(kind);
        if !script.is_file() {
            return Err(GeneratorError::ScriptMissing { path: script });
        }

        info!(daemon = %kind, qps = step.qps, secs = step.duration_secs, "Executing test");

        let args = vec![step.qps.to_string(), step.duration_secs.to_string()];
        let config = CommandConfig::for_generator(
            Duration::from_secs(u64::from(step.duration_secs)),
            self.slack,
        )
        .in_dir(&self.dir);
        let status = run_command_streaming(&script.to_string_lossy(), &args, &config).await?;

        if !status.success() {
            return Err(GeneratorError::Failed { kind, step, status });
        }
        Ok(())
    }
}
