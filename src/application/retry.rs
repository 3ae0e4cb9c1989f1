//! Bounded retry with fixed backoff.
//!
//! Every wait in kiln — SSH connectivity, package installation, provider
//! state polling — goes through these two helpers, so the attempt/delay
//! accounting lives in exactly one place.

use std::time::Duration;

use anyhow::Result;

use crate::domain::error::RetriesExhausted;

/// Maximum attempt count and the fixed delay slept between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// One attempt's failure, deciding whether the loop continues.
#[derive(Debug)]
pub enum StepError {
    /// Worth another attempt after the policy delay.
    Retryable(anyhow::Error),
    /// Propagate immediately without further attempts.
    Fatal(anyhow::Error),
}

/// Run `op` until it succeeds, up to `policy.max_attempts` times.
///
/// The operation receives the 1-based attempt number and runs exactly once
/// per attempt: N attempts means N invocations and N−1 sleeps. A
/// [`StepError::Fatal`] failure propagates without further attempts.
///
/// # Errors
///
/// On exhaustion, returns [`RetriesExhausted`] carrying `what` and the
/// last attempt's failure.
pub async fn retry<T>(
    policy: RetryPolicy,
    what: &str,
    mut op: impl AsyncFnMut(u32) -> Result<T, StepError>,
) -> Result<T> {
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(StepError::Fatal(e)) => return Err(e),
            Err(StepError::Retryable(e)) => {
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    Err(RetriesExhausted {
        what: what.to_string(),
        attempts: policy.max_attempts,
        last_error: last_error.map_or_else(|| "never attempted".to_string(), |e| e.to_string()),
    }
    .into())
}

/// Poll `probe` until it reports the condition holds.
///
/// The probe returns `Ok(true)` when done, `Ok(false)` to keep polling
/// after the policy delay, or `Err` for a fatal condition that propagates
/// immediately.
///
/// # Errors
///
/// Returns [`RetriesExhausted`] if the condition never held within the
/// budget — never silent success.
pub async fn wait_until(
    policy: RetryPolicy,
    what: &str,
    mut probe: impl AsyncFnMut() -> Result<bool>,
) -> Result<()> {
    retry(policy, what, async |_| match probe().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(StepError::Retryable(anyhow::anyhow!(
            "condition not yet met"
        ))),
        Err(e) => Err(StepError::Fatal(e)),
    })
    .await
}
