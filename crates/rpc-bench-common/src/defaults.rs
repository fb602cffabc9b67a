//! Default configuration values
//!
//! These constants mirror the defaults of the positional command line, so the
//! runner and tests agree on them.

/// Core-affinity sentinel meaning "do not pin the daemon"
pub const NO_PINNING: &str = "-";

/// Default daemon address (used for the upstream node and the local endpoint)
pub const DEFAULT_DAEMON_ADDRESS: &str = "localhost";

/// Default rpcdaemon install directory (turbo-geth checkout)
pub const DEFAULT_INSTALL_DIR: &str = "../../../turbo-geth/";

/// Default number of repetitions per step
pub const DEFAULT_REPETITIONS: u32 = 10;

/// Default test sequence (`qps+seconds` groups separated by `-`)
pub const DEFAULT_TEST_SEQUENCE: &str = "50+30-200+30-200+60-400+30";

/// Default silkrpc daemon binary
pub const DEFAULT_SILKRPC_BIN: &str = "../../build_gcc_release/silkrpc/silkrpcdaemon";

/// Port of the upstream node's private API
pub const UPSTREAM_PRIVATE_API_PORT: u16 = 9090;

/// Port silkrpc serves JSON-RPC on
pub const SILKRPC_LOCAL_PORT: u16 = 51515;

/// Port rpcdaemon serves JSON-RPC on
pub const RPCDAEMON_HTTP_PORT: u16 = 8545;

/// Host rpcdaemon binds its HTTP endpoint to when no `--http.addr` is given
pub const RPCDAEMON_HTTP_HOST: &str = "localhost";

/// Settling pause after a daemon start or stop, in milliseconds
pub const DEFAULT_DAEMON_SETTLE_MS: u64 = 1000;

/// Settling pause between two runs, in milliseconds
pub const DEFAULT_RUN_SETTLE_MS: u64 = 1000;

/// Maximum time to wait for a daemon endpoint to accept connections, in seconds
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;

/// Grace period between SIGTERM and SIGKILL when stopping a daemon, in seconds
pub const DEFAULT_STOP_GRACE_SECS: u64 = 5;

/// Slack added to a step's duration before the generator is considered hung, in seconds
pub const DEFAULT_GENERATOR_SLACK_SECS: u64 = 120;
