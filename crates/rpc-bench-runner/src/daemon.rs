//! Daemon lifecycle management
//!
//! Starts and stops the two daemon variants as background processes. The
//! manager keeps the `Child` handle of the daemon it launched and is the only
//! place that can start or stop one, which gives two guarantees:
//!
//! - at most one daemon runs at any time (`start` refuses while another runs)
//! - a daemon never outlives the manager (kill-on-drop on every exit path)
//!
//! Processes are only ever signalled through their retained pid; nothing
//! searches the process table by name.

use crate::command::forward_lines;
use crate::error::DaemonError;
use crate::wait::{endpoint_accepts, wait_for_resource, WaitConfig, WaitError};
use rpc_bench_common::defaults::{NO_PINNING, RPCDAEMON_HTTP_HOST, UPSTREAM_PRIVATE_API_PORT};
use rpc_bench_common::DaemonKind;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ports the daemons serve JSON-RPC on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonPorts {
    pub silkrpc: u16,
    pub rpcdaemon: u16,
}

impl Default for DaemonPorts {
    fn default() -> Self {
        Self {
            silkrpc: DaemonKind::Silkrpc.serving_port(),
            rpcdaemon: DaemonKind::Rpcdaemon.serving_port(),
        }
    }
}

impl DaemonPorts {
    pub fn for_kind(&self, kind: DaemonKind) -> u16 {
        match kind {
            DaemonKind::Silkrpc => self.silkrpc,
            DaemonKind::Rpcdaemon => self.rpcdaemon,
        }
    }
}

/// Everything needed to launch either daemon
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    /// turbo-geth checkout holding `build/bin/rpcdaemon`
    pub install_dir: PathBuf,
    /// silkrpc daemon binary
    pub silkrpc_bin: PathBuf,
    /// Host of the upstream node and of the local endpoints
    pub address: String,
    /// `taskset -c` CPU list, or [`NO_PINNING`]
    pub affinity: String,
    pub ports: DaemonPorts,
    /// Pause after every start and stop
    pub settle: Duration,
    /// Time between SIGTERM and SIGKILL
    pub stop_grace: Duration,
    /// Endpoint probe after start; `None` trusts the settling pause alone
    pub readiness: Option<WaitConfig>,
}

/// Program and arguments of a daemon launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl DaemonInvocation {
    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl DaemonSettings {
    pub fn is_pinned(&self) -> bool {
        self.affinity != NO_PINNING
    }

    /// `host:port` the daemon serves on.
    ///
    /// silkrpc binds the `--local` address it is given. rpcdaemon gets no
    /// `--http.addr`, so it listens on its default host whatever `address` is.
    pub fn endpoint(&self, kind: DaemonKind) -> String {
        let host = match kind {
            DaemonKind::Silkrpc => self.address.as_str(),
            DaemonKind::Rpcdaemon => RPCDAEMON_HTTP_HOST,
        };
        format!("{host}:{}", self.ports.for_kind(kind))
    }

    fn upstream(&self) -> String {
        format!("{}:{}", self.address, UPSTREAM_PRIVATE_API_PORT)
    }

    /// Build the launch command for `kind`, wrapped in `taskset` when pinned
    pub fn invocation(&self, kind: DaemonKind) -> DaemonInvocation {
        let (binary, daemon_args) = match kind {
            DaemonKind::Rpcdaemon => (
                self.install_dir.join("build/bin/rpcdaemon"),
                vec![
                    format!("--private.api.addr={}", self.upstream()),
                    "--http.api=eth,debug,net,web3".to_string(),
                ],
            ),
            DaemonKind::Silkrpc => (
                self.silkrpc_bin.clone(),
                vec![
                    "--target".to_string(),
                    self.upstream(),
                    "--local".to_string(),
                    self.endpoint(kind),
                    "--logLevel".to_string(),
                    "c".to_string(),
                ],
            ),
        };
        let binary = binary.to_string_lossy().into_owned();

        if self.is_pinned() {
            let mut args = vec!["-c".to_string(), self.affinity.clone(), binary];
            args.extend(daemon_args);
            DaemonInvocation {
                program: "taskset".to_string(),
                args,
            }
        } else {
            DaemonInvocation {
                program: binary,
                args: daemon_args,
            }
        }
    }
}

/// Lifecycle operations the campaign drives.
///
/// Implementations must keep at most one daemon running and make `stop`
/// idempotent.
#[allow(async_fn_in_trait)]
pub trait DaemonControl {
    /// Launch `kind`; fails if any daemon is already running
    async fn start(&mut self, kind: DaemonKind) -> Result<(), DaemonError>;

    /// Stop `kind` if it is running; succeeds when it is not
    async fn stop(&mut self, kind: DaemonKind) -> Result<(), DaemonError>;

    /// Kind of the daemon currently running, if any
    fn running_kind(&mut self) -> Option<DaemonKind>;

    /// OS thread count of the running daemon, main thread included.
    ///
    /// `None` when no daemon runs or the count cannot be read.
    fn thread_count(&mut self) -> Option<usize>;
}

/// A daemon launched by [`DaemonManager`]
#[derive(Debug)]
pub struct RunningDaemon {
    kind: DaemonKind,
    pid: u32,
    child: Child,
}

impl RunningDaemon {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status if the process already ended
    fn exited(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// SIGTERM, then SIGKILL once `grace` elapses
    async fn terminate(mut self, grace: Duration) -> Result<(), DaemonError> {
        if let Some(status) = self.exited() {
            warn!(kind = %self.kind, pid = self.pid, %status, "Daemon had already exited");
            return Ok(());
        }

        send_sigterm(self.kind, self.pid)?;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(kind = %self.kind, pid = self.pid, %status, "Daemon stopped");
                Ok(())
            }
            Ok(Err(source)) => Err(DaemonError::Wait {
                kind: self.kind,
                source,
            }),
            Err(_) => {
                warn!(
                    kind = %self.kind,
                    pid = self.pid,
                    grace_secs = grace.as_secs(),
                    "Daemon ignored SIGTERM, killing"
                );
                self.child.kill().await.map_err(|source| DaemonError::Wait {
                    kind: self.kind,
                    source,
                })
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(kind: DaemonKind, pid: u32) -> Result<(), DaemonError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid as NixPid;

    match kill(NixPid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(DaemonError::Signal { kind, pid, source }),
    }
}

#[cfg(not(unix))]
fn send_sigterm(_kind: DaemonKind, _pid: u32) -> Result<(), DaemonError> {
    // No SIGTERM here: the grace period runs out and the child is killed
    Ok(())
}

/// Owns the one daemon process a campaign may have running
pub struct DaemonManager {
    settings: DaemonSettings,
    active: Option<RunningDaemon>,
    cancel: CancellationToken,
    system: System,
}

impl DaemonManager {
    pub fn new(settings: DaemonSettings, cancel: CancellationToken) -> Self {
        Self {
            settings,
            active: None,
            cancel,
            system: System::new(),
        }
    }

    /// Pid of the running daemon, if any
    pub fn running_pid(&self) -> Option<u32> {
        self.active.as_ref().map(RunningDaemon::pid)
    }

    fn spawn(&self, kind: DaemonKind) -> Result<RunningDaemon, DaemonError> {
        let invocation = self.settings.invocation(kind);
        info!(
            kind = %kind,
            command = %invocation.command_line(),
            "Starting daemon"
        );

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches us, and we stop the daemon
        #[cfg(unix)]
        command.process_group(0);

        let spawn_err = |source: std::io::Error| DaemonError::Spawn {
            kind,
            program: invocation.program.clone(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_err)?;
        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other("process exited before its pid was read"))
        })?;

        if let Some(out) = child.stdout.take() {
            tokio::spawn(forward_lines(kind.label().to_string(), "stdout", out));
        }
        if let Some(err) = child.stderr.take() {
            tokio::spawn(forward_lines(kind.label().to_string(), "stderr", err));
        }

        Ok(RunningDaemon { kind, pid, child })
    }

    async fn settle(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.settle) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn wait_until_ready(
        &self,
        daemon: &mut RunningDaemon,
        config: &WaitConfig,
    ) -> Result<(), DaemonError> {
        let kind = daemon.kind;
        let endpoint = self.settings.endpoint(kind);
        let target = endpoint.as_str();
        let result = wait_for_resource(
            config,
            Some(&self.cancel),
            || async move { Ok(endpoint_accepts(target, config.timeout).await) },
            target,
        )
        .await;

        match result {
            Ok(()) => {
                info!(kind = %kind, endpoint = %endpoint, "Daemon accepting connections");
                Ok(())
            }
            Err(WaitError::Cancelled { .. }) => Err(DaemonError::Cancelled { kind }),
            Err(e) => {
                debug!(kind = %kind, error = %e, "Readiness probe gave up");
                match daemon.exited() {
                    Some(status) => Err(DaemonError::StartFailed { kind, status }),
                    None => Err(DaemonError::NotReady {
                        kind,
                        endpoint,
                        timeout: config.timeout,
                    }),
                }
            }
        }
    }
}

impl DaemonControl for DaemonManager {
    async fn start(&mut self, kind: DaemonKind) -> Result<(), DaemonError> {
        if let Some(running) = self.running_kind() {
            return Err(DaemonError::AlreadyRunning {
                requested: kind,
                running,
            });
        }

        let mut daemon = self.spawn(kind)?;
        self.settle().await;

        if let Some(status) = daemon.exited() {
            return Err(DaemonError::StartFailed { kind, status });
        }
        if self.cancel.is_cancelled() {
            return Err(DaemonError::Cancelled { kind });
        }

        if let Some(config) = self.settings.readiness.clone() {
            // On failure `daemon` is dropped here, which kills the process
            self.wait_until_ready(&mut daemon, &config).await?;
        }

        info!(kind = %kind, pid = daemon.pid, "Daemon started");
        self.active = Some(daemon);
        Ok(())
    }

    async fn stop(&mut self, kind: DaemonKind) -> Result<(), DaemonError> {
        match self.active.take() {
            Some(daemon) if daemon.kind == kind => {
                daemon.terminate(self.settings.stop_grace).await?;
            }
            other => {
                self.active = other;
                debug!(kind = %kind, "Daemon not running, nothing to stop");
            }
        }

        tokio::time::sleep(self.settings.settle).await;
        Ok(())
    }

    fn running_kind(&mut self) -> Option<DaemonKind> {
        let daemon = self.active.as_mut()?;
        if let Some(status) = daemon.exited() {
            warn!(kind = %daemon.kind, pid = daemon.pid, %status, "Daemon exited unexpectedly");
            self.active = None;
            return None;
        }
        Some(daemon.kind)
    }

    fn thread_count(&mut self) -> Option<usize> {
        let pid = Pid::from_u32(self.active.as_ref()?.pid);
        self.system
            .refresh_processes_specifics(ProcessRefreshKind::new());
        // `tasks` lists the threads besides the main one
        self.system
            .process(pid)?
            .tasks()
            .map(|tasks| tasks.len() + 1)
    }
}

impl Drop for DaemonManager {
    fn drop(&mut self) {
        if let Some(daemon) = self.active.as_mut() {
            warn!(kind = %daemon.kind, pid = daemon.pid, "Killing daemon left running");
            let _ = daemon.child.start_kill();
        }
    }
}
