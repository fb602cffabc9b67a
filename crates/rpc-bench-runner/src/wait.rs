//! Readiness waiting with exponential backoff and cancellation support.
//!
//! Used instead of a fixed sleep to decide when a freshly started daemon is
//! able to serve: the check is retried with growing delays until it reports
//! ready, errors, the timeout elapses, or the campaign is cancelled.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for readiness waiting with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Why a wait ended without the resource becoming ready
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timed out waiting for {resource} after {attempts} attempts")]
    Timeout { resource: String, attempts: u32 },

    #[error("wait for {resource} cancelled")]
    Cancelled { resource: String },

    #[error("readiness check for {resource} failed: {source}")]
    Check {
        resource: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Wait for a resource to become ready with exponential backoff.
///
/// # Arguments
/// * `config` - Wait configuration
/// * `cancel` - Optional cancellation token
/// * `check` - Async function that returns `Ok(true)` when ready, `Ok(false)` to retry
/// * `resource_name` - Name for logging
pub async fn wait_for_resource<F, Fut>(
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<(), WaitError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = tokio::time::Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(WaitError::Cancelled {
                resource: resource_name.to_string(),
            });
        }

        // A single check may not outlast the deadline
        let remaining = config.timeout.saturating_sub(start.elapsed());
        let checked = tokio::time::timeout(remaining, check())
            .await
            .unwrap_or(Ok(false));

        match checked {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {}
            Err(source) => {
                warn!(resource = %resource_name, error = ?source, "Readiness check failed");
                return Err(WaitError::Check {
                    resource: resource_name.to_string(),
                    source,
                });
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(WaitError::Timeout {
                resource: resource_name.to_string(),
                attempts,
            });
        }

        let delay = delays
            .next()
            .unwrap_or(config.max_delay)
            .min(config.timeout - elapsed);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Resource not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                return Err(WaitError::Cancelled {
                    resource: resource_name.to_string(),
                });
            }
        }
    }
}

/// Check once whether `endpoint` (`host:port`) accepts TCP connections
/// within `limit`
pub async fn endpoint_accepts(endpoint: &str, limit: Duration) -> bool {
    matches!(
        tokio::time::timeout(limit, TcpStream::connect(endpoint)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        wait_for_resource(
            &fast(2000),
            None,
            move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
            "flaky",
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = wait_for_resource(&fast(50), None, || async { Ok(false) }, "never")
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = wait_for_resource(&fast(5000), Some(&token), || async { Ok(false) }, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let err = wait_for_resource(
            &fast(5000),
            None,
            || async { Err(anyhow::anyhow!("boom")) },
            "broken",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Check { .. }));
    }

    #[tokio::test]
    async fn test_hanging_check_is_bounded_by_timeout() {
        let started = std::time::Instant::now();
        let err = wait_for_resource(
            &fast(100),
            None,
            || std::future::pending::<Result<bool>>(),
            "silent",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { attempts: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_endpoint_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(endpoint_accepts(&addr, Duration::from_secs(2)).await);

        drop(listener);
        assert!(!endpoint_accepts(&addr, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_endpoint_accepts_gives_up_after_limit() {
        // Non-routable: the connect either hangs or fails outright
        let started = std::time::Instant::now();
        assert!(!endpoint_accepts("10.255.255.1:8545", Duration::from_millis(100)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
