//! Caller-level retry over whole handshake attempts
//!
//! The state machine never retries. A caller that wants resilience runs
//! fresh attempts (new transport, new identity, new machine) with
//! exponential backoff in between.

mod backoff;

pub use backoff::ExponentialBackoff;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::handshake::AttemptReport;

/// Run up to `max_attempts` attempts until one succeeds or fails for a
/// reason retrying cannot fix.
///
/// `attempt` receives the 1-based attempt number and must build everything
/// the attempt needs from scratch. Gateway rejections, protocol mismatches
/// and crypto errors are returned immediately. Cancelling `cancel` during a
/// backoff delay returns the last report.
pub async fn connect_with_retry<F, Fut>(
    mut attempt: F,
    mut backoff: ExponentialBackoff,
    max_attempts: u32,
    cancel: &CancellationToken,
) -> AttemptReport
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptReport>,
{
    let max_attempts = max_attempts.max(1);
    let mut number = 1;

    loop {
        let report = attempt(number).await;

        let failure = match report.outcome.failure() {
            None => {
                tracing::info!("Attempt {} succeeded", number);
                return report;
            }
            Some(failure) => failure,
        };

        if !failure.error.is_retryable() {
            tracing::warn!("Attempt {} failed: {}. Not retrying", number, failure);
            return report;
        }
        if number >= max_attempts {
            tracing::warn!("Attempt {} failed: {}. Giving up", number, failure);
            return report;
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            "Attempt {} failed: {}. Retrying in {:?}",
            number,
            failure,
            delay
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Retry cancelled");
                return report;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        number += 1;
    }
}
