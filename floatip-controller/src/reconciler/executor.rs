use floatip_core::cloud::{AssignResponse, CloudProvider, ASSIGN_SUCCESS_STATUS};
use floatip_core::ReconcileError;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::balancer::Assignment;

/// Longest sleep between two assign attempts, however the schedule grows.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Retry schedule for assign calls.
///
/// At most `steps` attempts are made. Between attempts the executor sleeps
/// `duration`, then `duration * factor`, `duration * factor^2` and so on, each
/// capped at [`MAX_RETRY_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub duration: Duration,
    pub factor: f64,
    pub steps: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
            factor: 1.2,
            steps: 5,
        }
    }
}

impl Backoff {
    /// The sleeps between consecutive attempts, `steps - 1` of them, computed as
    /// they are consumed.
    pub fn delays(&self) -> Delays {
        Delays {
            next: self.duration.min(MAX_RETRY_DELAY),
            factor: self.factor,
            remaining: self.steps.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    factor: f64,
    remaining: u32,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next;
        // an overflowing or non-finite product saturates at the cap
        self.next = Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor)
            .map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY));
        Some(delay)
    }
}

/// Send one assign call, retrying every error until the backoff runs out.
///
/// Errors are not classified: a 503 and a 401 are retried alike. A call that
/// returns without error must still carry the documented success status, anything
/// else is reported as `UnexpectedStatus` without further attempts.
///
/// Cancellation is only observed while sleeping between attempts; an attempt in
/// flight always completes.
pub(crate) async fn assign_with_retry(
    cloud: &dyn CloudProvider,
    backoff: &Backoff,
    assignment: &Assignment,
    cancel: &CancellationToken,
) -> Result<AssignResponse, ReconcileError> {
    let mut delays = backoff.delays();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let err = match cloud
            .assign_floating_ip(assignment.floating_ip, assignment.server)
            .await
        {
            Ok(response) if response.status == ASSIGN_SUCCESS_STATUS => return Ok(response),
            Ok(response) => {
                return Err(ReconcileError::UnexpectedStatus {
                    address: assignment.address.clone(),
                    status: response.status,
                    expected: ASSIGN_SUCCESS_STATUS,
                })
            }
            Err(err) => err,
        };

        let Some(delay) = delays.next() else {
            return Err(ReconcileError::Mutation {
                address: assignment.address.clone(),
                attempts,
                source: err,
            });
        };

        warn!(
            floating_ip = %assignment.address,
            server = %assignment.server_name,
            attempt = attempts,
            retry_in = ?delay,
            error = %err,
            "assign call failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
