//! Per-run result types
//!
//! Latency figures are kept as the literal text the generator printed
//! (`1.234ms`, `987.6µs`, ...). They are never re-parsed into numbers so the
//! generator's units reach the report unchanged.

use crate::daemon_kind::DaemonKind;
use crate::sequence::TestSequenceStep;

/// Latency percentiles of one run, verbatim from the generator report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LatencySummary {
    pub min: String,
    pub mean: String,
    pub p50: String,
    pub p90: String,
    pub p95: String,
    pub p99: String,
    pub max: String,
}

impl LatencySummary {
    /// Figures in report column order (Min, Mean, P50, P90, P95, P99, Max)
    pub fn columns(&self) -> [&str; 7] {
        [
            &self.min, &self.mean, &self.p50, &self.p90, &self.p95, &self.p99, &self.max,
        ]
    }
}

/// What happened to a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The generator report was read
    Completed(LatencySummary),
    /// The run failed and the campaign was configured to carry on
    Skipped { reason: String },
}

/// Result of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Daemon under test
    pub daemon: DaemonKind,
    /// Run index within its repetition group (0-based)
    pub run_index: u32,
    /// Thread count of the daemon process when the result was collected,
    /// `None` when it could not be read
    pub threads: Option<usize>,
    /// Load profile of the run
    pub step: TestSequenceStep,
    pub outcome: RunOutcome,
}

impl RunResult {
    /// Create a completed run result
    pub fn completed(
        daemon: DaemonKind,
        run_index: u32,
        threads: Option<usize>,
        step: TestSequenceStep,
        latency: LatencySummary,
    ) -> Self {
        Self {
            daemon,
            run_index,
            threads,
            step,
            outcome: RunOutcome::Completed(latency),
        }
    }

    /// Create a skipped run result
    pub fn skipped(
        daemon: DaemonKind,
        run_index: u32,
        step: TestSequenceStep,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            daemon,
            run_index,
            threads: None,
            step,
            outcome: RunOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, RunOutcome::Skipped { .. })
    }

    pub fn latency(&self) -> Option<&LatencySummary> {
        match &self.outcome {
            RunOutcome::Completed(latency) => Some(latency),
            RunOutcome::Skipped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> LatencySummary {
        LatencySummary {
            min: "1ms".into(),
            mean: "2ms".into(),
            p50: "3ms".into(),
            p90: "4ms".into(),
            p95: "5ms".into(),
            p99: "6ms".into(),
            max: "7ms".into(),
        }
    }

    #[test]
    fn test_columns_order() {
        assert_eq!(
            summary().columns(),
            ["1ms", "2ms", "3ms", "4ms", "5ms", "6ms", "7ms"]
        );
    }

    #[test]
    fn test_completed_constructor() {
        let result = RunResult::completed(
            DaemonKind::Silkrpc,
            3,
            Some(12),
            TestSequenceStep::new(50, 30),
            summary(),
        );
        assert_eq!(result.run_index, 3);
        assert_eq!(result.threads, Some(12));
        assert!(!result.is_skipped());
        assert_eq!(result.latency().unwrap().p99, "6ms");
    }

    #[test]
    fn test_skipped_constructor() {
        let result = RunResult::skipped(
            DaemonKind::Rpcdaemon,
            0,
            TestSequenceStep::new(200, 30),
            "report missing",
        );
        assert!(result.is_skipped());
        assert_eq!(result.threads, None);
        assert!(result.latency().is_none());
    }
}
