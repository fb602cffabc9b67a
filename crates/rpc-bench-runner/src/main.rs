//! rpc-bench: latency comparison of silkrpc and rpcdaemon under vegeta load
//!
//! Starts each daemon in turn, runs the configured load sequence against it
//! and appends one CSV row per run to a timestamped report.

use rpc_bench_runner::campaign::run_campaign;
use rpc_bench_runner::config::{self, usage_failure, CampaignConfig};
use rpc_bench_runner::error::ConfigError;
use rpc_bench_runner::logging;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match config::resolve(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Display(e)) => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let program = std::env::args_os()
                .next()
                .map(|arg| arg.to_string_lossy().into_owned())
                .unwrap_or_else(|| "rpc-bench".to_string());
            eprintln!("{}", usage_failure(&program, &e));
            std::process::exit(-1);
        }
    };

    logging::init_tracing();

    if let Err(e) = run(config).await {
        print_error(&e);
        std::process::exit(1);
    }
}

async fn run(config: CampaignConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping campaign");
            on_interrupt.cancel();
        }
    });

    let report = run_campaign(&config, cancel).await?;
    info!(
        path = %report.path.display(),
        rows = report.summary.rows(),
        skipped = report.summary.skipped,
        "Report written"
    );
    Ok(())
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    }
}
