//! Generator report parsing
//!
//! Each generator run leaves a vegeta text report named after its step and
//! daemon. Only the `Latencies` line is read:
//!
//! ```text
//! Latencies     [min, mean, 50, 90, 95, 99, max]  1.02ms, 2.38ms, 2.1ms, 3ms, 3.5ms, 5.8ms, 20.1ms
//! ```
//!
//! The bracketed column list is checked against the expected schema so a
//! change in vegeta's layout is reported instead of shifting columns.

use crate::error::ParseError;
use rpc_bench_common::{DaemonKind, LatencySummary, TestSequenceStep};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Label of the report line holding the latency summary
const LATENCIES_LABEL: &str = "Latencies";

/// Column names vegeta prints for the latency summary, in order
const LATENCY_SCHEMA: [&str; 7] = ["min", "mean", "50", "90", "95", "99", "max"];

/// File name the generator writes for `step` against `kind`
pub fn artifact_name(step: TestSequenceStep, kind: DaemonKind) -> String {
    format!(
        "getLogs_{}qps_{}s_{}_perf.hrd",
        step.qps,
        step.duration_secs,
        kind.label()
    )
}

/// Full path of the report for `step` against `kind` inside `dir`
pub fn artifact_path(dir: &Path, step: TestSequenceStep, kind: DaemonKind) -> PathBuf {
    dir.join(artifact_name(step, kind))
}

/// Read and parse the report at `path`
pub fn parse_report(path: &Path) -> Result<LatencySummary, ParseError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ParseError::ReportMissing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ParseError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let summary = parse_report_text(&text).map_err(|reason| ParseError::malformed(path, reason))?;
    debug!(path = %path.display(), p99 = %summary.p99, "Parsed generator report");
    Ok(summary)
}

/// Extract the latency summary from report text.
///
/// Returns the reason as a plain string on failure; [`parse_report`] attaches
/// the path.
pub fn parse_report_text(text: &str) -> Result<LatencySummary, String> {
    let line = text
        .lines()
        .map(str::trim_start)
        .find(|line| {
            line.strip_prefix(LATENCIES_LABEL)
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
        .ok_or_else(|| format!("no {LATENCIES_LABEL} line"))?;

    let rest = &line[LATENCIES_LABEL.len()..];
    let open = rest
        .find('[')
        .ok_or_else(|| "latencies line has no column list".to_string())?;
    let close = rest[open..]
        .find(']')
        .map(|offset| open + offset)
        .ok_or_else(|| "latencies column list is not closed".to_string())?;

    let columns: Vec<&str> = rest[open + 1..close].split(',').map(str::trim).collect();
    if columns != LATENCY_SCHEMA {
        return Err(format!(
            "unexpected latency columns [{}], expected [{}]",
            columns.join(", "),
            LATENCY_SCHEMA.join(", ")
        ));
    }

    let values: Vec<&str> = rest[close + 1..].split(',').map(str::trim).collect();
    if values.len() != LATENCY_SCHEMA.len() {
        return Err(format!(
            "expected {} latency values, found {}",
            LATENCY_SCHEMA.len(),
            values.len()
        ));
    }
    if let Some(index) = values.iter().position(|value| value.is_empty()) {
        return Err(format!("empty value for latency column '{}'", LATENCY_SCHEMA[index]));
    }

    Ok(LatencySummary {
        min: values[0].to_string(),
        mean: values[1].to_string(),
        p50: values[2].to_string(),
        p90: values[3].to_string(),
        p95: values[4].to_string(),
        p99: values[5].to_string(),
        max: values[6].to_string(),
    })
}
