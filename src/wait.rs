//! Bounded-wait and retry primitives.
//!
//! Every suspension in the workflow goes through these: a fixed sleep to let
//! the portal's client-side render settle, a polling loop with an explicit
//! deadline, or a named retry policy. A timeout always surfaces as a typed
//! error instead of hanging.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, ScrapeError};

/// Pause after a UI action so the portal's digest cycle can settle.
pub const RENDER_SETTLE: Duration = Duration::from_secs(3);

/// Overall deadline when waiting for a result grid after submitting a search.
pub const RESULTS_WAIT: WaitPolicy = WaitPolicy::new(Duration::from_secs(50), Duration::from_millis(500));

/// Deadline for a generated PDF to land in the download directory. Large
/// multi-page documents have been observed to take ~35s to generate.
pub const DOWNLOAD_WAIT: WaitPolicy = WaitPolicy::new(Duration::from_secs(60), Duration::from_secs(1));

/// Short deadline for row metadata lookups in the details view.
pub const METADATA_WAIT: WaitPolicy = WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(250));

/// Deadline for optional modals (result-limit notice, large-document notice).
pub const MODAL_WAIT: WaitPolicy = WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(250));

/// Tab-switch retry policy for the party search form.
pub const TAB_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    delay: RENDER_SETTLE,
};

/// A bounded polling loop: total timeout plus the interval between probes.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Poll `probe` until it yields `Some(T)` or the policy's deadline passes.
///
/// `desc` names the awaited condition in the timeout error.
pub async fn wait_until<T, F, Fut>(policy: WaitPolicy, desc: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if start.elapsed() >= policy.timeout {
            return Err(ScrapeError::Timeout(desc.to_string()));
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// A bounded reattempt loop with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Run `op` up to `policy.max_attempts` times until it yields `Some(T)`.
///
/// `Ok(None)` means "not yet, reattempt"; an `Err` from `op` is logged and
/// also treated as a reattempt. Returns `None` when every attempt failed.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, desc: &str, mut op: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        debug!("Attempt {}/{}: {}", attempt, policy.max_attempts, desc);
        match op(attempt).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => debug!("{} attempt {} failed: {}", desc, attempt, e),
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }
    None
}

/// Fixed sleep for render settling.
pub async fn settle() {
    tokio::time::sleep(RENDER_SETTLE).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_until_returns_value_when_probe_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = WaitPolicy::new(Duration::from_secs(1), Duration::from_millis(1));
        let got = wait_until(policy, "counter", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if n >= 2 { Some(n) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(got, 2);
    }

    #[tokio::test]
    async fn wait_until_times_out_with_typed_error() {
        let policy = WaitPolicy::new(Duration::from_millis(10), Duration::from_millis(2));
        let err = wait_until::<(), _, _>(policy, "never", || async { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout(_)));
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        };
        let got: Option<()> = retry(policy, "never", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await;
        assert!(got.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
