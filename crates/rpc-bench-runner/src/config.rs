//! Campaign configuration
//!
//! The positional form `<pattern-source> [core-affinity] [daemon-address]
//! [install-dir] [repetitions] [sequence]` is the primary interface. The long
//! flags (and their `RPC_BENCH_*` variables) cover the operational knobs
//! around it.

use crate::daemon::{DaemonPorts, DaemonSettings};
use crate::error::ConfigError;
use crate::wait::WaitConfig;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use garde::Validate;
use rpc_bench_common::defaults::{
    DEFAULT_DAEMON_ADDRESS, DEFAULT_DAEMON_SETTLE_MS, DEFAULT_GENERATOR_SLACK_SECS,
    DEFAULT_INSTALL_DIR, DEFAULT_READINESS_TIMEOUT_SECS, DEFAULT_REPETITIONS, DEFAULT_RUN_SETTLE_MS,
    DEFAULT_SILKRPC_BIN, DEFAULT_STOP_GRACE_SECS, DEFAULT_TEST_SEQUENCE, NO_PINNING,
};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// What to do when a single run fails (generator error or unreadable report)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RunFailurePolicy {
    /// End the campaign with the run's error
    #[default]
    Abort,
    /// Record a SKIPPED row and carry on with the next run
    Skip,
}

#[derive(Parser, Debug)]
#[command(name = "rpc-bench")]
#[command(about = "Compare silkrpc and rpcdaemon latency under vegeta load")]
#[command(version)]
pub struct Args {
    /// Vegeta pattern archive
    pub pattern_source: PathBuf,

    /// CPU list for `taskset -c`, or `-` to leave the daemon unpinned
    #[arg(default_value = NO_PINNING)]
    pub core_affinity: String,

    /// Address of the node and of the daemon endpoints
    #[arg(default_value = DEFAULT_DAEMON_ADDRESS)]
    pub daemon_address: String,

    /// turbo-geth checkout containing build/bin/rpcdaemon
    #[arg(default_value = DEFAULT_INSTALL_DIR)]
    pub install_dir: PathBuf,

    /// Runs per step and daemon
    #[arg(default_value_t = DEFAULT_REPETITIONS)]
    pub repetitions: u32,

    /// Load steps as `qps+seconds` groups joined by `-`
    #[arg(default_value = DEFAULT_TEST_SEQUENCE)]
    pub sequence: String,

    /// Directory the CSV report is written to
    #[arg(long, env = "RPC_BENCH_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory holding the vegeta_attack_getLogs_<daemon>.sh scripts
    #[arg(long, env = "RPC_BENCH_GENERATOR_DIR", default_value = ".")]
    pub generator_dir: PathBuf,

    /// silkrpc daemon binary
    #[arg(long, env = "RPC_BENCH_SILKRPC_BIN", default_value = DEFAULT_SILKRPC_BIN)]
    pub silkrpc_bin: PathBuf,

    /// Pause after each daemon start and stop, in milliseconds
    #[arg(long, env = "RPC_BENCH_DAEMON_SETTLE_MS", default_value_t = DEFAULT_DAEMON_SETTLE_MS)]
    pub daemon_settle_ms: u64,

    /// Pause between runs, in milliseconds
    #[arg(long, env = "RPC_BENCH_RUN_SETTLE_MS", default_value_t = DEFAULT_RUN_SETTLE_MS)]
    pub run_settle_ms: u64,

    /// How long a started daemon may take to accept connections
    #[arg(long, env = "RPC_BENCH_READINESS_TIMEOUT_SECS", default_value_t = DEFAULT_READINESS_TIMEOUT_SECS)]
    pub readiness_timeout_secs: u64,

    /// Skip the endpoint probe and rely on the settling pause alone
    #[arg(long, env = "RPC_BENCH_NO_READINESS_PROBE")]
    pub no_readiness_probe: bool,

    /// Time between SIGTERM and SIGKILL when stopping a daemon
    #[arg(long, env = "RPC_BENCH_STOP_GRACE_SECS", default_value_t = DEFAULT_STOP_GRACE_SECS)]
    pub stop_grace_secs: u64,

    /// Extra time a generator run may take beyond its step duration
    #[arg(long, env = "RPC_BENCH_GENERATOR_SLACK_SECS", default_value_t = DEFAULT_GENERATOR_SLACK_SECS)]
    pub generator_slack_secs: u64,

    /// What to do when a single run fails
    #[arg(long, env = "RPC_BENCH_ON_RUN_FAILURE", value_enum, default_value_t = RunFailurePolicy::Abort)]
    pub on_run_failure: RunFailurePolicy,

    /// Directory the pattern archive is unpacked into
    #[arg(long, env = "RPC_BENCH_PATTERN_STAGING_DIR", default_value = "/tmp")]
    pub pattern_staging_dir: PathBuf,

    /// Do not unpack the pattern archive
    #[arg(long, env = "RPC_BENCH_NO_PATTERN_STAGING")]
    pub no_pattern_staging: bool,
}

/// Resolved campaign configuration, read-only once built
#[derive(Debug, Clone, Validate)]
pub struct CampaignConfig {
    #[garde(skip)]
    pub pattern_source: PathBuf,

    #[garde(length(min = 1))]
    pub affinity: String,

    #[garde(length(min = 1))]
    pub address: String,

    #[garde(skip)]
    pub install_dir: PathBuf,

    #[garde(range(min = 1))]
    pub repetitions: u32,

    /// Unparsed; see [`rpc_bench_common::TestSequence::parse`]
    #[garde(length(min = 1))]
    pub sequence: String,

    #[garde(skip)]
    pub output_dir: PathBuf,

    #[garde(skip)]
    pub generator_dir: PathBuf,

    #[garde(skip)]
    pub silkrpc_bin: PathBuf,

    #[garde(skip)]
    pub daemon_settle_ms: u64,

    #[garde(skip)]
    pub run_settle_ms: u64,

    /// `None` disables the readiness probe
    #[garde(range(min = 1))]
    pub readiness_timeout_secs: Option<u64>,

    #[garde(skip)]
    pub stop_grace_secs: u64,

    #[garde(range(min = 1))]
    pub generator_slack_secs: u64,

    #[garde(skip)]
    pub on_run_failure: RunFailurePolicy,

    /// `None` disables pattern staging
    #[garde(skip)]
    pub pattern_staging_dir: Option<PathBuf>,
}

impl From<Args> for CampaignConfig {
    fn from(args: Args) -> Self {
        Self {
            pattern_source: args.pattern_source,
            affinity: args.core_affinity,
            address: args.daemon_address,
            install_dir: args.install_dir,
            repetitions: args.repetitions,
            sequence: args.sequence,
            output_dir: args.output_dir,
            generator_dir: args.generator_dir,
            silkrpc_bin: args.silkrpc_bin,
            daemon_settle_ms: args.daemon_settle_ms,
            run_settle_ms: args.run_settle_ms,
            readiness_timeout_secs: (!args.no_readiness_probe)
                .then_some(args.readiness_timeout_secs),
            stop_grace_secs: args.stop_grace_secs,
            generator_slack_secs: args.generator_slack_secs,
            on_run_failure: args.on_run_failure,
            pattern_staging_dir: (!args.no_pattern_staging).then_some(args.pattern_staging_dir),
        }
    }
}

impl CampaignConfig {
    pub fn daemon_settle(&self) -> Duration {
        Duration::from_millis(self.daemon_settle_ms)
    }

    pub fn run_settle(&self) -> Duration {
        Duration::from_millis(self.run_settle_ms)
    }

    pub fn generator_slack(&self) -> Duration {
        Duration::from_secs(self.generator_slack_secs)
    }

    /// Settings for the daemon lifecycle manager
    pub fn daemon_settings(&self) -> DaemonSettings {
        DaemonSettings {
            install_dir: self.install_dir.clone(),
            silkrpc_bin: self.silkrpc_bin.clone(),
            address: self.address.clone(),
            affinity: self.affinity.clone(),
            ports: DaemonPorts::default(),
            settle: self.daemon_settle(),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
            readiness: self
                .readiness_timeout_secs
                .map(|secs| WaitConfig::with_timeout(Duration::from_secs(secs))),
        }
    }
}

/// Resolve and validate the configuration from a full argument list
/// (program name first).
///
/// Any parse or validation failure is a [`ConfigError::Usage`] or
/// [`ConfigError::Invalid`]; `--help`/`--version` come back as
/// [`ConfigError::Display`].
pub fn resolve<I, T>(args: I) -> Result<CampaignConfig, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ConfigError::Display(e),
        _ => ConfigError::Usage(e.to_string().trim_end().to_string()),
    })?;

    let config = CampaignConfig::from(args);
    config.validate()?;
    Ok(config)
}

/// The two-line usage message printed on any usage error
pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <patternTarFile> [daemonOnCore - or 0-1 or 0-2 ...] [daemonAddress localhost or IP] \
         [installDir i.e. {DEFAULT_INSTALL_DIR}] [repetitions i.e. {DEFAULT_REPETITIONS}] [sequence i.e. 200+30-400+10]\n\
         Options: see `{program} --help` (defaults: affinity {NO_PINNING}, address {DEFAULT_DAEMON_ADDRESS}, sequence {DEFAULT_TEST_SEQUENCE})"
    )
}

/// What gets printed for a rejected command line: the usage text, then the reason
pub fn usage_failure(program: &str, error: &ConfigError) -> String {
    format!("{}\n{error}", usage(program))
}
