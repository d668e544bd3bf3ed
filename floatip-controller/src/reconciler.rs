mod balancer;
mod executor;
mod floating_ip_source;
mod matcher;
mod resolver;

pub use balancer::{plan_assignments, Assignment};
pub use executor::{Backoff, Delays, MAX_RETRY_DELAY};

use floatip_core::cloud::CloudProvider;
use floatip_core::cluster::{AddressKind, ClusterApi};
use floatip_core::{ReconcileError, Result};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::controller_metrics::{ASSIGNMENTS_TOTAL, ASSIGNMENT_FAILURES_TOTAL, RUNNING_SERVERS};
use executor::assign_with_retry;
use floating_ip_source::managed_floating_ips;
use matcher::running_servers;
use resolver::resolve_addresses;

/// What a pass needs to know besides the clients.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSettings {
    /// Which node address is compared against server addresses.
    pub address_kind: AddressKind,
    /// Floating IP addresses to manage; empty means every floating IP of the project.
    pub floating_ips: Vec<String>,
    pub backoff: Backoff,
}

/// An assignment given up on during a pass.
#[derive(Debug)]
pub struct AssignmentFailure {
    pub assignment: Assignment,
    pub error: ReconcileError,
}

/// Outcome of a pass that got as far as applying its plan.
#[derive(Debug, Default)]
pub struct PassReport {
    pub running_servers: usize,
    pub floating_ips: usize,
    pub assigned: Vec<Assignment>,
    pub failed: Vec<AssignmentFailure>,
}

/// Reconciler runs the resolve, match, source, balance, mutate pipeline.
///
/// It holds the clients and settings explicitly; every pass works on a fresh
/// snapshot and nothing carries over to the next one.
#[derive(Clone)]
pub struct Reconciler {
    cloud: Arc<dyn CloudProvider>,
    cluster: Arc<dyn ClusterApi>,
    settings: Arc<ReconcileSettings>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        cloud: Arc<dyn CloudProvider>,
        cluster: Arc<dyn ClusterApi>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            cloud,
            cluster,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Run one pass.
    ///
    /// Failing to resolve members, match servers or list floating IPs fails the
    /// pass before any mutation. Individual assignments that cannot be applied are
    /// logged and collected in the report; the remaining ones still go out.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<PassReport> {
        debug!("checking floating IPs");

        let addresses =
            resolve_addresses(self.cluster.as_ref(), self.settings.address_kind).await?;
        let running = running_servers(self.cloud.as_ref(), &addresses).await?;
        gauge!(RUNNING_SERVERS.name).set(running.len() as f64);

        let floating_ips =
            managed_floating_ips(self.cloud.as_ref(), &self.settings.floating_ips).await?;
        let plan = plan_assignments(&floating_ips, &running);

        let mut report = PassReport {
            running_servers: running.len(),
            floating_ips: floating_ips.len(),
            ..Default::default()
        };

        for assignment in plan {
            info!(
                floating_ip = %assignment.address,
                server = %assignment.server_name,
                previous_server = ?assignment.previous_server,
                "switching floating IP to server"
            );

            match assign_with_retry(
                self.cloud.as_ref(),
                &self.settings.backoff,
                &assignment,
                cancel,
            )
            .await
            {
                Ok(_) => {
                    counter!(ASSIGNMENTS_TOTAL.name).increment(1);
                    report.assigned.push(assignment);
                }
                Err(ReconcileError::Cancelled) => return Err(ReconcileError::Cancelled),
                Err(error) => {
                    counter!(ASSIGNMENT_FAILURES_TOTAL.name).increment(1);
                    error!(
                        floating_ip = %assignment.address,
                        server = %assignment.server_name,
                        error = %error,
                        "could not update floating IP"
                    );
                    report.failed.push(AssignmentFailure { assignment, error });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;
