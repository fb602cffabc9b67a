//! End-to-end campaigns against stub daemons and generators
//!
//! The daemons are `/bin/sh` scripts that sleep until signalled and the
//! generator scripts write canned vegeta reports, so a whole campaign runs in
//! well under a second per step.

#![cfg(unix)]

use rpc_bench_common::{DaemonKind, TestSequenceStep};
use rpc_bench_runner::campaign::run_campaign;
use rpc_bench_runner::config::{resolve, CampaignConfig};
use rpc_bench_test_utils::scripts::{
    read_invocations, write_generator_script, write_script, GeneratorBehavior,
};
use rpc_bench_test_utils::vegeta::write_sample_report;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const COLUMN_HEADER: &str = "Daemon,TestNo,Threads,Qps,Time,Min,Mean,P50,P90,P95,P99,Max";

/// Scratch layout: install dir, silkrpc binary, generator dir and output dir
struct Bench {
    root: TempDir,
}

impl Bench {
    fn new(daemon_body: &str) -> Self {
        let bench = Self {
            root: tempfile::tempdir().unwrap(),
        };
        for dir in ["D/build/bin", "gen", "out"] {
            std::fs::create_dir_all(bench.path(dir)).unwrap();
        }
        bench.daemons(daemon_body);
        bench
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    /// Both daemon stubs log their start to `started.log` and then run `body`
    fn daemons(&self, body: &str) {
        let log = self.path("started.log");
        for (kind, path) in [
            (DaemonKind::Rpcdaemon, self.path("D/build/bin/rpcdaemon")),
            (DaemonKind::Silkrpc, self.path("silkrpcdaemon")),
        ] {
            write_script(
                &path,
                &format!("echo {} >> \"{}\"\n{body}", kind.label(), log.display()),
            );
        }
    }

    fn generator(&self, kind: DaemonKind, behavior: GeneratorBehavior) {
        write_generator_script(&self.path("gen"), kind, behavior);
    }

    fn started(&self) -> Vec<String> {
        std::fs::read_to_string(self.path("started.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn config(&self, pattern: &str, sequence: &str, extra: &[&str]) -> CampaignConfig {
        let install = format!("{}/", self.path("D").display());
        let silkrpc = self.path("silkrpcdaemon").display().to_string();
        let generator = self.path("gen").display().to_string();
        let output = self.path("out").display().to_string();

        let mut args = vec![
            "rpc-bench",
            pattern,
            "-",
            "127.0.0.1",
            install.as_str(),
            "2",
            sequence,
            "--silkrpc-bin",
            silkrpc.as_str(),
            "--generator-dir",
            generator.as_str(),
            "--output-dir",
            output.as_str(),
            "--no-readiness-probe",
            "--no-pattern-staging",
            "--daemon-settle-ms",
            "50",
            "--run-settle-ms",
            "0",
            "--stop-grace-secs",
            "2",
        ];
        args.extend_from_slice(extra);
        resolve(args).unwrap()
    }

    fn reports(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.path("out"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

fn read_report(path: &Path) -> (Vec<String>, Vec<String>) {
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let split = lines
        .iter()
        .position(|line| line == COLUMN_HEADER)
        .expect("column header present");
    (lines[..split].to_vec(), lines[split + 1..].to_vec())
}

#[tokio::test]
async fn test_two_step_campaign() {
    let bench = Bench::new("exec sleep 30");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::Report);
    bench.generator(DaemonKind::Rpcdaemon, GeneratorBehavior::Report);
    let config = bench.config("p.tar", "50+30-200+30", &[]);

    let report = run_campaign(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(report.summary.rows(), 8);
    assert_eq!(report.summary.skipped, 0);

    let (header, rows) = read_report(&report.path);
    assert!(header.contains(&",,,,,,,,,,,,,VegetaFile,p.tar".to_string()));
    assert!(header.contains(&",,,,,,,,,,,,,DaemonRunOnCore,-".to_string()));
    assert_eq!(&header[header.len() - 2..], ["", ""]);
    assert_eq!(rows.len(), 8);

    let keys: Vec<String> = rows
        .iter()
        .map(|row| {
            let fields: Vec<&str> = row.split(',').collect();
            assert_eq!(fields.len(), 12, "row: {row}");
            if cfg!(target_os = "linux") {
                let threads: usize = fields[2].parse().unwrap();
                assert!(threads >= 1, "row: {row}");
            }
            format!("{} {} {} {}", fields[0], fields[1], fields[3], fields[4])
        })
        .collect();
    assert_eq!(
        keys,
        [
            "silkrpc 0 50 30",
            "silkrpc 1 50 30",
            "silkrpc 0 200 30",
            "silkrpc 1 200 30",
            "rpcdaemon 0 50 30",
            "rpcdaemon 1 50 30",
            "rpcdaemon 0 200 30",
            "rpcdaemon 1 200 30",
        ]
    );
    assert!(rows[0].ends_with(",1.021ms,2.389ms,2.101ms,3.004ms,3.512ms,5.873ms,20.114ms"));

    assert_eq!(bench.started(), ["silkrpc", "rpcdaemon"]);
    assert_eq!(read_invocations(&bench.path("gen")).len(), 8);

    // Every generator report was consumed
    let leftovers: Vec<_> = std::fs::read_dir(bench.path("gen"))
        .unwrap()
        .filter_map(|entry| {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            name.ends_with(".hrd").then_some(name)
        })
        .collect();
    assert!(leftovers.is_empty(), "leftover reports: {leftovers:?}");
}

#[tokio::test]
async fn test_pattern_checksum_in_header() {
    let bench = Bench::new("exec sleep 30");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::Report);
    bench.generator(DaemonKind::Rpcdaemon, GeneratorBehavior::Report);
    let pattern = bench.path("p.tar");
    std::fs::write(&pattern, b"abc").unwrap();
    let config = bench.config(&pattern.display().to_string(), "50+30", &[]);

    let report = run_campaign(&config, CancellationToken::new()).await.unwrap();
    let (header, _) = read_report(&report.path);
    assert!(header.contains(
        &",,,,,,,,,,,,,VegetaChecksum,sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            .to_string()
    ));
}

#[tokio::test]
async fn test_malformed_sequence_has_no_side_effects() {
    let bench = Bench::new("exec sleep 30");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::Report);
    let config = bench.config("p.tar", "50-200+30", &[]);

    let err = run_campaign(&config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid test sequence"));
    assert!(bench.started().is_empty());
    assert!(bench.reports().is_empty());
    assert!(read_invocations(&bench.path("gen")).is_empty());
}

#[tokio::test]
async fn test_skip_policy_marks_failed_runs() {
    let bench = Bench::new("exec sleep 30");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::Report);
    bench.generator(DaemonKind::Rpcdaemon, GeneratorBehavior::Malformed);
    let config = bench.config("p.tar", "50+30", &["--on-run-failure", "skip"]);

    let report = run_campaign(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(report.summary.completed, 2);
    assert_eq!(report.summary.skipped, 2);

    let (_, rows) = read_report(&report.path);
    assert_eq!(rows.len(), 4);
    assert!(rows[2].starts_with("rpcdaemon,0,-,50,30,SKIPPED"));
    assert!(rows[3].starts_with("rpcdaemon,1,-,50,30,SKIPPED"));
}

#[tokio::test]
async fn test_missing_report_aborts_and_keeps_rows() {
    let bench = Bench::new("exec sleep 30");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::NoReport);
    // Left over from an earlier campaign
    let leftover =
        write_sample_report(&bench.path("gen"), DaemonKind::Silkrpc, TestSequenceStep::new(50, 30));
    let config = bench.config("p.tar", "50+30", &[]);

    let err = run_campaign(&config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("does not exist"));
    assert!(!leftover.exists());

    // Daemon B never ran, and the report was still closed with its header
    assert_eq!(bench.started(), ["silkrpc"]);
    let reports = bench.reports();
    assert_eq!(reports.len(), 1);
    let (_, rows) = read_report(&reports[0]);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_daemon_start_failure_aborts() {
    let bench = Bench::new("exit 1");
    bench.generator(DaemonKind::Silkrpc, GeneratorBehavior::Report);
    bench.generator(DaemonKind::Rpcdaemon, GeneratorBehavior::Report);
    let config = bench.config("p.tar", "50+30", &[]);

    let err = run_campaign(&config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to start silkrpc"));
    assert_eq!(bench.started(), ["silkrpc"]);
    assert!(read_invocations(&bench.path("gen")).is_empty());
}
