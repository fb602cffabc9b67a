//! Executable shell stubs
//!
//! Daemon and generator stand-ins written as `/bin/sh` scripts into a test's
//! temporary directory.

use crate::vegeta::{report_file_name, SAMPLE_LATENCIES};
use rpc_bench_common::{DaemonKind, TestSequenceStep};
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script with `body`
pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make script executable");
    }
}

/// What a stub generator does when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBehavior {
    /// Write a well-formed report and exit 0
    Report,
    /// Exit 0 without writing a report
    NoReport,
    /// Write a report without a latencies line
    Malformed,
    /// Exit with status 1
    Fail,
}

/// Write `vegeta_attack_getLogs_<label>.sh` into `dir`.
///
/// Every invocation appends `<label> <qps> <seconds>` to `dir/invocations.log`
/// so tests can check ordering.
pub fn write_generator_script(dir: &Path, kind: DaemonKind, behavior: GeneratorBehavior) -> PathBuf {
    let path = dir.join(format!("vegeta_attack_getLogs_{}.sh", kind.label()));
    // Placeholder step: the real qps/seconds come from $1/$2 at run time
    let report = report_file_name(kind, TestSequenceStep::new(1, 1))
        .replacen("1qps_1s", "${1}qps_${2}s", 1);
    let latencies = SAMPLE_LATENCIES.join(", ");

    let action = match behavior {
        GeneratorBehavior::Report => format!(
            "printf 'Requests      [total, rate, throughput]         1, 1.00, 1.00\\n' > \"{report}\"\n\
             printf 'Duration      [total, attack, wait]             1s, 1s, 1ms\\n' >> \"{report}\"\n\
             printf 'Latencies     [min, mean, 50, 90, 95, 99, max]  {latencies}\\n' >> \"{report}\""
        ),
        GeneratorBehavior::NoReport => "true".to_string(),
        GeneratorBehavior::Malformed => {
            format!("printf 'Requests [total] 1\\nnothing useful\\n' > \"{report}\"")
        }
        GeneratorBehavior::Fail => "exit 1".to_string(),
    };

    write_script(
        &path,
        &format!(
            "echo \"{} $1 $2\" >> invocations.log\n{action}",
            kind.label()
        ),
    );
    path
}

/// Read back the invocation log written by generator stubs
pub fn read_invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("invocations.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
