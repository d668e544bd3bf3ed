use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::controller_metrics::{
    RECONCILE_DURATION_SECONDS, RECONCILE_FAILURES_TOTAL, RECONCILE_PASSES_TOTAL,
};
use crate::reconciler::Reconciler;
use floatip_core::ReconcileError;

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Reconciling,
    Stopped,
}

/// ControlLoop runs a reconciliation pass right away and then once per interval
/// until it is cancelled. A failing pass is logged and the loop carries on.
#[derive(Debug, Clone)]
pub struct ControlLoop {
    reconciler: Reconciler,
    interval: Duration,
    state: Arc<Mutex<LoopState>>,
}

impl ControlLoop {
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
            state: Arc::new(Mutex::new(LoopState::Idle)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn state(&self) -> LoopState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: LoopState) {
        *self.state.lock().await = state;
    }

    pub async fn run(&self, cancel: CancellationToken) {
        // a restarted loop starts fresh, not in the Stopped state of its last run
        self.set_state(LoopState::Idle).await;
        if cancel.is_cancelled() {
            self.set_state(LoopState::Stopped).await;
            info!("reconcile loop cancelled before the first pass");
            return;
        }

        self.pass(&cancel).await;
        info!(interval = ?self.interval, "initialization complete, reconciling periodically");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.pass(&cancel).await,
            }
        }

        self.set_state(LoopState::Stopped).await;
        info!("reconcile loop stopped");
    }

    async fn pass(&self, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }

        self.set_state(LoopState::Reconciling).await;
        counter!(RECONCILE_PASSES_TOTAL.name).increment(1);
        let started = Instant::now();

        match self.reconciler.reconcile(cancel).await {
            Ok(report) if report.failed.is_empty() => {}
            Ok(report) => warn!(
                assigned = report.assigned.len(),
                failed = report.failed.len(),
                "pass finished with floating IPs left unassigned"
            ),
            Err(ReconcileError::Cancelled) => info!("pass abandoned on shutdown"),
            Err(e) => {
                counter!(RECONCILE_FAILURES_TOTAL.name).increment(1);
                error!(error = %e, "could not update floating IPs");
            }
        }

        histogram!(RECONCILE_DURATION_SECONDS.name).record(started.elapsed().as_secs_f64());
        self.set_state(LoopState::Idle).await;
    }
}

#[cfg(test)]
#[path = "control_loop_test.rs"]
mod tests;
