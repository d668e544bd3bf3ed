use crate::control_loop::ControlLoop;
use crate::controller_metrics::LEADER_ELECTION_STATE;
use floatip_core::lease::LeaseLock;
use metrics::gauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum LeaderElectionState {
    Following,
    Leading,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct LeaderElectionConfig {
    pub identity: String,
    /// How long a lease stays valid without renewal.
    pub lease_duration: Duration,
    /// How long the leader keeps trying to renew before it steps down.
    pub renew_deadline: Duration,
    /// Pause between acquire attempts, and between renewals while leading.
    pub retry_period: Duration,
}

impl LeaderElectionConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

// Why a term of leadership ended.
#[derive(Debug, PartialEq)]
enum Term {
    Shutdown,
    Lost,
    LoopExited,
}

// Leader Election over a lease lock.
// Replicas poll the lease until they hold it; the holder runs the control loop and
// keeps renewing. Losing the lease stops the loop and sends the replica back to polling.
#[derive(Clone)]
pub struct LeaderElection {
    lock: Arc<dyn LeaseLock>,
    config: LeaderElectionConfig,
    state: Arc<Mutex<LeaderElectionState>>,
}

impl std::fmt::Debug for LeaderElection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderElection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LeaderElection {
    pub fn new(lock: Arc<dyn LeaseLock>, config: LeaderElectionConfig) -> Self {
        Self {
            lock,
            config,
            state: Arc::new(Mutex::new(LeaderElectionState::Following)),
        }
    }

    pub async fn get_state(&self) -> LeaderElectionState {
        let state = self.state.lock().await;
        state.clone()
    }

    async fn set_state(&self, new_state: LeaderElectionState) {
        let mut state = self.state.lock().await;
        if *state != new_state {
            *state = new_state;
            // 0 = Following/Stopped, 1 = Leading
            let value = match *state {
                LeaderElectionState::Leading => 1.0,
                _ => 0.0,
            };
            gauge!(LEADER_ELECTION_STATE.name).set(value);
        }
    }

    /// Campaign for the lease and run `control` for as long as it is held.
    ///
    /// Returns once `shutdown` is cancelled, after the loop has stopped and the
    /// lease has been released.
    pub async fn run(&self, control: ControlLoop, shutdown: CancellationToken) {
        let identity = self.config.identity.as_str();

        loop {
            if !self.wait_for_lease(&shutdown).await {
                break;
            }

            self.set_state(LeaderElectionState::Leading).await;
            info!(identity, "started leading");

            match self.lead(&control, &shutdown).await {
                Term::Shutdown => {
                    self.release().await;
                    break;
                }
                Term::Lost => {
                    info!(identity, "stopped leading");
                }
                Term::LoopExited => {
                    warn!(identity, "reconcile loop exited while leading, giving up the lease");
                    self.release().await;
                }
            }
            self.set_state(LeaderElectionState::Following).await;
        }

        self.set_state(LeaderElectionState::Stopped).await;
        info!(identity, "leader election stopped");
    }

    // Poll the lease every retry period. False means shutdown came first.
    async fn wait_for_lease(&self, shutdown: &CancellationToken) -> bool {
        let identity = self.config.identity.as_str();

        loop {
            if shutdown.is_cancelled() {
                return false;
            }

            // a hung API call must not outlive shutdown or the renew deadline
            let attempt = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                attempt = timeout(
                    self.config.renew_deadline,
                    self.lock.acquire(identity, self.config.lease_duration),
                ) => attempt,
            };
            match attempt {
                Ok(Ok(true)) => return true,
                Ok(Ok(false)) => debug!(identity, "lease held by another replica"),
                Ok(Err(e)) => warn!(identity, error = %e, "failed to acquire lease"),
                Err(_) => warn!(
                    identity,
                    timeout = ?self.config.renew_deadline,
                    "acquire attempt timed out"
                ),
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                _ = sleep(self.config.retry_period) => {}
            }
        }
    }

    async fn lead(&self, control: &ControlLoop, shutdown: &CancellationToken) -> Term {
        let identity = self.config.identity.as_str();
        let lifetime = shutdown.child_token();
        // stops the loop even if this future is dropped mid-term
        let _lifetime_guard = lifetime.clone().drop_guard();

        let mut loop_task = tokio::spawn({
            let control = control.clone();
            let lifetime = lifetime.clone();
            async move { control.run(lifetime).await }
        });

        let period = self.config.retry_period;
        let mut renew_ticker = interval_at(Instant::now() + period, period);
        renew_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_renewed = Instant::now();

        let term = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Term::Shutdown,
                joined = &mut loop_task => {
                    if let Err(e) = joined {
                        error!(identity, error = %e, "reconcile loop task failed");
                    }
                    break Term::LoopExited;
                }
                _ = renew_ticker.tick() => {
                    if let Some(term) = self.renew(shutdown, &mut last_renewed).await {
                        break term;
                    }
                }
            }
        };

        lifetime.cancel();
        if term != Term::LoopExited {
            if let Err(e) = loop_task.await {
                error!(identity, error = %e, "reconcile loop task failed");
            }
        }
        term
    }

    // One renew attempt, bounded by what is left of the renew deadline.
    // Returns the end of the term, or None while the lease is still ours.
    async fn renew(&self, shutdown: &CancellationToken, last_renewed: &mut Instant) -> Option<Term> {
        let identity = self.config.identity.as_str();
        let deadline = self.config.renew_deadline;
        let remaining = deadline.saturating_sub(last_renewed.elapsed());
        if remaining.is_zero() {
            warn!(identity, deadline = ?deadline, "renew deadline exceeded");
            return Some(Term::Lost);
        }

        let attempt = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Some(Term::Shutdown),
            attempt = timeout(remaining, self.lock.renew(identity, self.config.lease_duration)) => attempt,
        };

        match attempt {
            Ok(Ok(true)) => {
                *last_renewed = Instant::now();
                None
            }
            Ok(Ok(false)) => {
                warn!(identity, "lease was taken over by another replica");
                Some(Term::Lost)
            }
            Ok(Err(e)) => {
                warn!(identity, error = %e, "failed to renew lease");
                if last_renewed.elapsed() >= deadline {
                    warn!(identity, deadline = ?deadline, "renew deadline exceeded");
                    return Some(Term::Lost);
                }
                None
            }
            Err(_) => {
                warn!(identity, deadline = ?deadline, "renew call outlived the renew deadline");
                Some(Term::Lost)
            }
        }
    }

    async fn release(&self) {
        let identity = self.config.identity.as_str();
        match self.lock.release(identity).await {
            Ok(()) => info!(identity, "released lease"),
            Err(e) => warn!(identity, error = %e, "failed to release lease"),
        }
    }
}

#[cfg(test)]
#[path = "leader_election_test.rs"]
mod tests;
