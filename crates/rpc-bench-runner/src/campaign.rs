//! Campaign orchestration
//!
//! Runs the whole test sequence against each daemon in turn:
//!
//! ```text
//! for daemon in [silkrpc, rpcdaemon]:
//!     start daemon
//!     for step in sequence:
//!         for run in 0..repetitions:
//!             clear stale report -> attack -> parse report -> sample threads
//!                 -> append row -> delete report
//!     stop daemon
//! ```
//!
//! Everything is sequential. The daemon is stopped on every exit path of its
//! block, including errors and cancellation.

use crate::config::{CampaignConfig, RunFailurePolicy};
use crate::daemon::{DaemonControl, DaemonManager};
use crate::error::{DaemonError, RunError};
use crate::generator::{remove_stale_report, LoadGenerator, VegetaScripts};
use crate::host::collect_header;
use crate::pattern::stage_pattern_archive;
use crate::report::ReportWriter;
use crate::results::parse_report;
use anyhow::{bail, Context, Result};
use chrono::Local;
use rpc_bench_common::{DaemonKind, RunResult, TestSequence, TestSequenceStep};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to run, independent of how daemons and load are driven
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub sequence: TestSequence,
    pub repetitions: u32,
    /// Pause after each run
    pub run_settle: Duration,
    pub on_run_failure: RunFailurePolicy,
}

impl CampaignPlan {
    /// Rows a complete campaign writes
    pub fn expected_rows(&self) -> usize {
        DaemonKind::CAMPAIGN_ORDER.len() * self.sequence.len() * self.repetitions as usize
    }
}

/// Totals of a finished campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignSummary {
    pub completed: usize,
    pub skipped: usize,
}

impl CampaignSummary {
    pub fn rows(&self) -> usize {
        self.completed + self.skipped
    }
}

pub struct Campaign<D, G> {
    daemons: D,
    generator: G,
    plan: CampaignPlan,
    cancel: CancellationToken,
}

impl<D: DaemonControl, G: LoadGenerator> Campaign<D, G> {
    pub fn new(daemons: D, generator: G, plan: CampaignPlan, cancel: CancellationToken) -> Self {
        Self {
            daemons,
            generator,
            plan,
            cancel,
        }
    }

    /// Run every daemon block, appending one row per run to `report`
    pub async fn run(&mut self, report: &mut ReportWriter) -> Result<CampaignSummary> {
        info!(
            repetitions = self.plan.repetitions,
            sequence = %self.plan.sequence,
            expected_rows = self.plan.expected_rows(),
            "Starting campaign"
        );

        let mut summary = CampaignSummary::default();
        for kind in DaemonKind::CAMPAIGN_ORDER {
            let outcome = self.run_daemon(kind, report, &mut summary).await;
            let stopped = self
                .daemons
                .stop(kind)
                .await
                .with_context(|| format!("failed to stop {kind}"));

            match (outcome, stopped) {
                (Err(e), Err(stop_err)) => {
                    warn!(daemon = %kind, error = %stop_err, "Stop after failed block also failed");
                    return Err(e);
                }
                (Err(e), Ok(())) | (Ok(()), Err(e)) => return Err(e),
                (Ok(()), Ok(())) => {}
            }
        }

        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            "Campaign complete"
        );
        Ok(summary)
    }

    async fn run_daemon(
        &mut self,
        kind: DaemonKind,
        report: &mut ReportWriter,
        summary: &mut CampaignSummary,
    ) -> Result<()> {
        self.daemons
            .start(kind)
            .await
            .with_context(|| format!("failed to start {kind}"))?;

        let steps: Vec<TestSequenceStep> = self.plan.sequence.steps().to_vec();
        for step in steps {
            for run_index in 0..self.plan.repetitions {
                self.ensure_live(kind)?;

                let result = match self.execute(kind, run_index, step).await {
                    Ok(None) => bail!("campaign cancelled during {kind} run {run_index}"),
                    Ok(Some((result, artifact))) => {
                        report.append(&result)?;
                        discard_artifact(&artifact);
                        summary.completed += 1;
                        result
                    }
                    Err(e) if self.plan.on_run_failure == RunFailurePolicy::Skip => {
                        warn!(
                            daemon = %kind,
                            run = run_index,
                            step = %step,
                            error = %e,
                            "Run failed, recording it as skipped"
                        );
                        let result = RunResult::skipped(kind, run_index, step, e.to_string());
                        report.append(&result)?;
                        summary.skipped += 1;
                        result
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("run {run_index} of step {step} against {kind} failed")
                        })
                    }
                };
                debug!(daemon = %kind, run = result.run_index, "Run recorded");

                self.pause(self.plan.run_settle).await;
            }
            info!(daemon = %kind, step = %step, "Step complete");
        }
        Ok(())
    }

    /// One generator run: clear the old report, attack, read the new report,
    /// sample threads.
    ///
    /// `Ok(None)` means the campaign was cancelled while the generator ran.
    async fn execute(
        &mut self,
        kind: DaemonKind,
        run_index: u32,
        step: TestSequenceStep,
    ) -> Result<Option<(RunResult, PathBuf)>, RunError> {
        info!(
            daemon = %kind,
            run = run_index,
            qps = step.qps,
            secs = step.duration_secs,
            "Executing test"
        );

        let artifact = self.generator.report_path(kind, step);
        remove_stale_report(&artifact)?;

        // Dropping the attack future kills the generator process
        tokio::select! {
            attack = self.generator.attack(kind, step) => attack?,
            _ = self.cancel.cancelled() => return Ok(None),
        }
        let latency = parse_report(&artifact)?;
        let threads = self.daemons.thread_count();

        Ok(Some((
            RunResult::completed(kind, run_index, threads, step, latency),
            artifact,
        )))
    }

    /// Fail if the campaign was cancelled or `kind` is no longer running
    fn ensure_live(&mut self, kind: DaemonKind) -> Result<()> {
        if self.cancel.is_cancelled() {
            bail!("campaign cancelled");
        }
        if self.daemons.running_kind() != Some(kind) {
            return Err(DaemonError::Exited { kind }.into());
        }
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// Where a finished campaign left its report, and what it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    pub path: PathBuf,
    pub summary: CampaignSummary,
}

/// Run a full campaign as configured.
///
/// The sequence is parsed before anything touches the host. The report is
/// closed whether or not the campaign succeeds.
pub async fn run_campaign(
    config: &CampaignConfig,
    cancel: CancellationToken,
) -> Result<CampaignReport> {
    let sequence = TestSequence::parse(&config.sequence)
        .with_context(|| format!("invalid test sequence '{}'", config.sequence))?;

    info!(
        pattern = %config.pattern_source.display(),
        affinity = %config.affinity,
        address = %config.address,
        policy = %config.on_run_failure,
        "Campaign configured"
    );

    if let Some(staging_dir) = &config.pattern_staging_dir {
        stage_pattern_archive(&config.pattern_source, staging_dir)
            .await
            .context("failed to stage pattern archive")?;
    }

    let header = collect_header(config).await;
    let mut report = ReportWriter::open(&config.output_dir, &header, &Local::now())?;

    let plan = CampaignPlan {
        sequence,
        repetitions: config.repetitions,
        run_settle: config.run_settle(),
        on_run_failure: config.on_run_failure,
    };
    let daemons = DaemonManager::new(config.daemon_settings(), cancel.clone());
    let generator = VegetaScripts::new(&config.generator_dir, config.generator_slack());
    let mut campaign = Campaign::new(daemons, generator, plan, cancel);

    let outcome = campaign.run(&mut report).await;
    let closed = report.close();

    let summary = outcome?;
    let path = closed?;
    Ok(CampaignReport { path, summary })
}

/// Remove a consumed generator report; a leftover file is only logged
fn discard_artifact(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove generator report");
    }
}
