//! Retry and polling utilities.
//!
//! Two shapes of waiting show up in a deploy:
//!
//! - [`retry_with_backoff`] re-runs a remote call whose error is transient
//!   (throttling, 5xx, a reset connection) with exponential backoff and jitter.
//! - [`poll_until`] re-reads remote state at a fixed interval until it
//!   converges. A poll that returns `Err` is fatal and stops the loop at once;
//!   only `Ok(None)` means "not yet".
//!
//! Both sleep through `tokio::time`, so tests can drive them on a paused clock.
//!
//! # Example
//!
//! ```ignore
//! use stratus_common::retry::{poll_until, PollPolicy, NAMESPACE_POLL_INTERVAL};
//!
//! let ns = poll_until(&PollPolicy::every(NAMESPACE_POLL_INTERVAL), "namespace ready", || async {
//!     let ns = api.get_namespace(&id).await?;
//!     Ok(ns.filter(|n| n.status.is_ready()))
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::{Error, Result};

/// Interval between namespace status polls
pub const NAMESPACE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between resource status polls after a deploy
pub const DEPLOY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between polls while waiting for a deletion to finish
pub const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between pushing images and deploying containers, so the registry
/// serves the new manifests
pub const REGISTRY_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Backoff for calls that may fail transiently
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, the first one included (0 = no limit)
    pub max_attempts: u32,
    /// Sleep before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single sleep
    pub max_delay: Duration,
    /// Growth factor applied after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff, giving up after `attempts` calls
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }

    /// Nominal sleep after failed attempt `attempt` (1-based), before jitter
    fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `operation` until it succeeds, retrying errors that
/// [`Error::is_retryable`] classifies as transient.
///
/// A non-retryable error is returned at once. Once `max_attempts` is reached
/// the last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if config.exhausted(attempt) {
            error!(operation = %operation_name, attempt, error = %err, "Giving up");
            return Err(err);
        }

        // spread concurrent retries over 0.5x..1.5x of the nominal delay
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        let delay = config.delay_after(attempt).mul_f64(factor);
        warn!(
            operation = %operation_name,
            attempt,
            error = %err,
            delay_ms = delay.as_millis(),
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// How long and how often to poll remote state.
///
/// The default is unbounded: the platform decides how long provisioning
/// takes, and the caller's process timeout is the effective bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between polls
    pub interval: Duration,
    /// Maximum number of polls (0 = unbounded)
    pub max_attempts: u32,
    /// Overall deadline measured from the first poll
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Unbounded polling at a fixed interval
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: 0,
            timeout: None,
        }
    }

    /// Stop after `attempts` polls
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Stop once `timeout` has elapsed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Poll until `poll_fn` yields a value.
///
/// * `Ok(Some(T))` - converged, returned to the caller
/// * `Ok(None)` - not yet, sleep one interval and poll again
/// * `Err(e)` - fatal, returned immediately without another poll
///
/// Returns [`Error::Timeout`] when the policy's attempt or time bound is hit.
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, description: &str, mut poll_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = tokio::time::Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        if let Some(value) = poll_fn().await? {
            return Ok(value);
        }

        if policy.max_attempts > 0 && attempt >= policy.max_attempts {
            return Err(Error::timeout(description, attempt));
        }
        if let Some(timeout) = policy.timeout {
            if start.elapsed() + policy.interval > timeout {
                return Err(Error::timeout(description, attempt));
            }
        }

        debug!(
            what = %description,
            attempt = attempt,
            interval_ms = policy.interval.as_millis(),
            "Not converged yet, polling again"
        );
        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn delay_grows_then_caps() {
        let config = fast_retry(0);
        assert_eq!(config.delay_after(1), Duration::from_millis(10));
        assert_eq!(config.delay_after(2), Duration::from_millis(20));
        assert_eq!(config.delay_after(3), Duration::from_millis(40));
        assert_eq!(config.delay_after(10), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_call_is_retried_until_it_passes() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let value = retry_with_backoff(&fast_retry(5), "put", || {
            let seen = seen.clone();
            async move {
                match seen.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::transport(429, "slow down")),
                    1 => Err(Error::network("connection reset")),
                    _ => Ok("stored"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result: Result<()> = retry_with_backoff(&fast_retry(5), "put", || {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transport(403, "signature expired")) }
        })
        .await;

        assert!(matches!(result, Err(Error::Transport { status: Some(403), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_is_returned_when_attempts_run_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result: Result<()> = retry_with_backoff(&fast_retry(3), "put", || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::transport(503, format!("unavailable #{n}"))) }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "unavailable #2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_on_third_poll() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let started = tokio::time::Instant::now();

        let value = poll_until(&PollPolicy::every(Duration::from_secs(5)), "thing", || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 3).then_some(n))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_error_stops_without_another_poll() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<()> = poll_until(&PollPolicy::every(Duration::from_secs(1)), "thing", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 1 {
                    Err(Error::remote_state("function", "f", "broken"))
                } else {
                    Ok(None)
                }
            }
        })
        .await;

        assert!(matches!(result, Err(Error::RemoteState { .. })));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_gives_up_after_max_attempts() {
        let policy = PollPolicy::every(Duration::from_secs(1)).with_max_attempts(4);
        let result: Result<()> = poll_until(&policy, "never", || async { Ok(None) }).await;

        match result {
            Err(Error::Timeout { what, attempts }) => {
                assert_eq!(what, "never");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_gives_up_after_timeout() {
        let policy = PollPolicy::every(Duration::from_secs(2)).with_timeout(Duration::from_secs(5));
        let result: Result<()> = poll_until(&policy, "slow", || async { Ok(None) }).await;

        // polls at t=0, 2, 4; the next one would land past the deadline
        assert!(matches!(result, Err(Error::Timeout { attempts: 3, .. })));
    }
}
