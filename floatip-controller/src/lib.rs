//! Floating IP controller.
//!
//! Keeps the floating IPs of a Hetzner Cloud project bound to servers that back
//! ready Kubernetes nodes, spreading them evenly. One replica at a time does the
//! work, elected through a lease.

pub mod control_loop;
pub mod controller_metrics;
pub mod leader_election;
pub mod reconciler;
pub mod service_configuration;

pub use control_loop::{ControlLoop, LoopState, DEFAULT_RECONCILE_INTERVAL};
pub use leader_election::{LeaderElection, LeaderElectionConfig, LeaderElectionState};
pub use reconciler::{
    plan_assignments, Assignment, AssignmentFailure, Backoff, PassReport, ReconcileSettings,
    Reconciler,
};
pub use service_configuration::{LoadConfiguration, ServiceConfiguration};
