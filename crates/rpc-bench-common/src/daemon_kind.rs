//! The two daemon variants under comparison
//!
//! The label of each variant is load-bearing: it keys the generator script
//! (`vegeta_attack_getLogs_<label>.sh`), the generator's report file name and
//! the `Daemon` column of the campaign report.

use crate::defaults::{RPCDAEMON_HTTP_PORT, SILKRPC_LOCAL_PORT};

/// Daemon variants, in campaign order
///
/// - `Silkrpc` (daemon A): the C++ silkrpc daemon
/// - `Rpcdaemon` (daemon B): the turbo-geth rpcdaemon
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum DaemonKind {
    #[strum(serialize = "silkrpc")]
    Silkrpc,
    #[strum(serialize = "rpcdaemon")]
    Rpcdaemon,
}

impl DaemonKind {
    /// Campaign order: every step of daemon A runs before any step of daemon B
    pub const CAMPAIGN_ORDER: [DaemonKind; 2] = [DaemonKind::Silkrpc, DaemonKind::Rpcdaemon];

    /// Label used in file names and in the report
    pub fn label(self) -> &'static str {
        match self {
            Self::Silkrpc => "silkrpc",
            Self::Rpcdaemon => "rpcdaemon",
        }
    }

    /// Port the daemon serves JSON-RPC on once it is up
    pub fn serving_port(self) -> u16 {
        match self {
            Self::Silkrpc => SILKRPC_LOCAL_PORT,
            Self::Rpcdaemon => RPCDAEMON_HTTP_PORT,
        }
    }
}
