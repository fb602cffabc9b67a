//! Sample vegeta text reports
//!
//! Mirrors the layout of `vegeta report -type=text`, which is what the
//! generator scripts leave behind after each attack.

use rpc_bench_common::{DaemonKind, TestSequenceStep};
use std::path::{Path, PathBuf};

/// Latency line values used by [`sample_report`], in column order
pub const SAMPLE_LATENCIES: [&str; 7] = [
    "1.021ms", "2.389ms", "2.101ms", "3.004ms", "3.512ms", "5.873ms", "20.114ms",
];

/// A complete vegeta text report for `step`
///
/// # Example
///
/// ```
/// use rpc_bench_common::TestSequenceStep;
/// use rpc_bench_test_utils::vegeta::sample_report;
///
/// let report = sample_report(TestSequenceStep::new(50, 30));
/// assert!(report.lines().nth(2).unwrap().starts_with("Latencies"));
/// ```
pub fn sample_report(step: TestSequenceStep) -> String {
    let total = u64::from(step.qps) * u64::from(step.duration_secs);
    format!(
        "Requests      [total, rate, throughput]         {total}, {qps}.00, {qps}.00\n\
         Duration      [total, attack, wait]             {secs}.001s, {secs}s, 1.2ms\n\
         Latencies     [min, mean, 50, 90, 95, 99, max]  {}\n\
         Bytes In      [total, mean]                     {bytes}, 512.00\n\
         Bytes Out     [total, mean]                     {bytes}, 128.00\n\
         Success       [ratio]                           100.00%\n\
         Status Codes  [code:count]                      200:{total}\n\
         Error Set:\n",
        SAMPLE_LATENCIES.join(", "),
        qps = step.qps,
        secs = step.duration_secs,
        bytes = total * 512,
    )
}

/// File name the generator uses for a run's report
pub fn report_file_name(kind: DaemonKind, step: TestSequenceStep) -> String {
    format!(
        "getLogs_{}qps_{}s_{}_perf.hrd",
        step.qps,
        step.duration_secs,
        kind.label()
    )
}

/// Write [`sample_report`] where the generator for `kind` would have put it
pub fn write_sample_report(dir: &Path, kind: DaemonKind, step: TestSequenceStep) -> PathBuf {
    let path = dir.join(report_file_name(kind, step));
    std::fs::write(&path, sample_report(step)).expect("failed to write sample report");
    path
}
