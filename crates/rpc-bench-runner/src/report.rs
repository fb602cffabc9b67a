//! Campaign report (CSV)
//!
//! One file per campaign, named after the campaign start time. Layout:
//!
//! ```text
//! ,,,,,,,,,,,,,PC,<cpu model>
//! ,,,,,,,,,,,,,DaemonRunOnCore,<affinity>
//! ... (VegetaFile, VegetaChecksum, GccVers, SilkVersion, RpcDaemon)
//!
//!
//! Daemon,TestNo,Threads,Qps,Time,Min,Mean,P50,P90,P95,P99,Max
//! silkrpc,0,12,50,30,1.02ms,...
//! ```
//!
//! Every appended row is flushed and synced before `append` returns, so an
//! interrupted campaign keeps all rows it finished.

use crate::error::ReportError;
use chrono::{DateTime, Local};
use rpc_bench_common::{RunOutcome, RunResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column header of the row stream
pub const COLUMN_HEADER: [&str; 12] = [
    "Daemon", "TestNo", "Threads", "Qps", "Time", "Min", "Mean", "P50", "P90", "P95", "P99", "Max",
];

/// Empty fields in front of each metadata key
pub const METADATA_PADDING: usize = 13;

/// Marker written in place of missing values on skipped runs
pub const SKIPPED_MARKER: &str = "SKIPPED";

/// Threads field when the count could not be read
pub const UNKNOWN_THREADS: &str = "-";

/// Placeholder for component versions that are not collected
const VERSION_PLACEHOLDER: &str = "TBD";

/// Report file name for a campaign started at `started`
pub fn report_file_name(started: &DateTime<Local>) -> String {
    format!("{}_perf.csv", started.format("%Y-%m-%d-%H:%M:%S"))
}

/// Host and input metadata written once at the top of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub machine_model: String,
    pub affinity: String,
    pub pattern_source: String,
    pub checksum: String,
    pub toolchain: String,
}

impl ReportHeader {
    /// Key/value pairs in file order
    pub fn entries(&self) -> [(&str, &str); 7] {
        [
            ("PC", self.machine_model.as_str()),
            ("DaemonRunOnCore", self.affinity.as_str()),
            ("VegetaFile", self.pattern_source.as_str()),
            ("VegetaChecksum", self.checksum.as_str()),
            ("GccVers", self.toolchain.as_str()),
            ("SilkVersion", VERSION_PLACEHOLDER),
            ("RpcDaemon", VERSION_PLACEHOLDER),
        ]
    }
}

/// Quote a field if it contains a separator, quote or line break
pub fn csv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

fn csv_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = fields
        .into_iter()
        .map(csv_field)
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Render one run as a report row
pub fn format_row(result: &RunResult) -> String {
    let qps = result.step.qps.to_string();
    let time = result.step.duration_secs.to_string();
    let test_no = result.run_index.to_string();

    match &result.outcome {
        RunOutcome::Completed(latency) => {
            let threads = result
                .threads
                .map_or_else(|| UNKNOWN_THREADS.to_string(), |n| n.to_string());
            let mut fields = vec![
                result.daemon.label(),
                test_no.as_str(),
                threads.as_str(),
                qps.as_str(),
                time.as_str(),
            ];
            fields.extend(latency.columns());
            csv_line(fields)
        }
        RunOutcome::Skipped { .. } => {
            let mut fields = vec![
                result.daemon.label(),
                test_no.as_str(),
                UNKNOWN_THREADS,
                qps.as_str(),
                time.as_str(),
            ];
            fields.extend([SKIPPED_MARKER; 7]);
            csv_line(fields)
        }
    }
}

/// Append-only writer owning the report file
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: usize,
}

impl ReportWriter {
    /// Create the report in `dir` and write the header block
    pub fn open(
        dir: &Path,
        header: &ReportHeader,
        started: &DateTime<Local>,
    ) -> Result<Self, ReportError> {
        let path = dir.join(report_file_name(started));
        let file = File::create(&path).map_err(|source| ReportError::Create {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Creating report file");

        let mut report = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };

        let padding = [""; METADATA_PADDING];
        let mut block = String::new();
        for (key, value) in header.entries() {
            block.push_str(&csv_line(padding.iter().copied().chain([key, value])));
        }
        block.push_str("\n\n");
        block.push_str(&csv_line(COLUMN_HEADER));

        report.write_durable(&block)?;
        Ok(report)
    }

    /// Append one row; it is on stable storage when this returns
    pub fn append(&mut self, result: &RunResult) -> Result<(), ReportError> {
        self.write_durable(&format_row(result))?;
        self.rows += 1;
        debug!(
            daemon = %result.daemon,
            run = result.run_index,
            step = %result.step,
            rows = self.rows,
            "Appended report row"
        );
        Ok(())
    }

    /// Flush and release the file
    pub fn close(mut self) -> Result<PathBuf, ReportError> {
        self.sync()?;
        info!(path = %self.path.display(), rows = self.rows, "Report closed");
        Ok(self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn write_durable(&mut self, text: &str) -> Result<(), ReportError> {
        self.writer
            .write_all(text.as_bytes())
            .map_err(|source| self.write_error(source))?;
        self.sync()
    }

    fn sync(&mut self) -> Result<(), ReportError> {
        self.writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_data())
            .map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: std::io::Error) -> ReportError {
        ReportError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rpc_bench_common::{DaemonKind, LatencySummary, TestSequenceStep};

    fn header() -> ReportHeader {
        ReportHeader {
            machine_model: "AMD Ryzen 9 5950X 16-Core Processor".to_string(),
            affinity: "-".to_string(),
            pattern_source: "p.tar".to_string(),
            checksum: "sha256:abc".to_string(),
            toolchain: "gcc (GCC) 13.2.0".to_string(),
        }
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn latency() -> LatencySummary {
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
    fn test_report_file_name() {
        assert_eq!(report_file_name(&started()), "2024-03-09-14:05:07_perf.csv");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_format_completed_row() {
        let result = RunResult::completed(
            DaemonKind::Silkrpc,
            1,
            Some(14),
            TestSequenceStep::new(50, 30),
            latency(),
        );
        assert_eq!(
            format_row(&result),
            "silkrpc,1,14,50,30,1ms,2ms,3ms,4ms,5ms,6ms,7ms\n"
        );
    }

    #[test]
    fn test_format_row_with_unknown_threads() {
        let result = RunResult::completed(
            DaemonKind::Rpcdaemon,
            2,
            None,
            TestSequenceStep::new(50, 30),
            latency(),
        );
        assert_eq!(
            format_row(&result),
            "rpcdaemon,2,-,50,30,1ms,2ms,3ms,4ms,5ms,6ms,7ms\n"
        );
    }

    #[test]
    fn test_format_skipped_row() {
        let result = RunResult::skipped(
            DaemonKind::Rpcdaemon,
            0,
            TestSequenceStep::new(200, 60),
            "report missing",
        );
        assert_eq!(
            format_row(&result),
            "rpcdaemon,0,-,200,60,SKIPPED,SKIPPED,SKIPPED,SKIPPED,SKIPPED,SKIPPED,SKIPPED\n"
        );
    }

    #[test]
    fn test_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::open(dir.path(), &header(), &started()).unwrap();
        let path = writer.close().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], ",,,,,,,,,,,,,PC,AMD Ryzen 9 5950X 16-Core Processor");
        assert_eq!(lines[2], ",,,,,,,,,,,,,VegetaFile,p.tar");
        assert_eq!(lines[4], ",,,,,,,,,,,,,GccVers,gcc (GCC) 13.2.0");
        assert_eq!(lines[5], ",,,,,,,,,,,,,SilkVersion,TBD");
        assert_eq!(lines[6], ",,,,,,,,,,,,,RpcDaemon,TBD");
        assert_eq!(lines[7], "");
        assert_eq!(lines[8], "");
        assert_eq!(
            lines[9],
            "Daemon,TestNo,Threads,Qps,Time,Min,Mean,P50,P90,P95,P99,Max"
        );
    }

    #[test]
    fn test_append_is_visible_before_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReportWriter::open(dir.path(), &header(), &started()).unwrap();
        let result = RunResult::completed(
            DaemonKind::Silkrpc,
            0,
            Some(8),
            TestSequenceStep::new(50, 30),
            latency(),
        );
        writer.append(&result).unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert!(text.ends_with("silkrpc,0,8,50,30,1ms,2ms,3ms,4ms,5ms,6ms,7ms\n"));
        assert_eq!(writer.rows(), 1);
    }

    #[test]
    fn test_open_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReportWriter::open(&dir.path().join("nope"), &header(), &started()).unwrap_err();
        assert!(matches!(err, ReportError::Create { .. }));
    }
}
