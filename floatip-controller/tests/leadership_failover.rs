//! Two replicas sharing one lease and one project.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Project;
use floatip_controller::{
    ControlLoop, LeaderElection, LeaderElectionConfig, LeaderElectionState,
    DEFAULT_RECONCILE_INTERVAL,
};
use floatip_core::memory::MemoryLease;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct Replica {
    election: LeaderElection,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

fn start_replica(project: &Project, lease: &MemoryLease, identity: &str) -> Replica {
    let control = ControlLoop::new(project.reconciler(), DEFAULT_RECONCILE_INTERVAL);
    let election = LeaderElection::new(
        Arc::new(lease.clone()),
        LeaderElectionConfig::new(identity),
    );
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let election = election.clone();
        let shutdown = shutdown.clone();
        async move { election.run(control, shutdown).await }
    });
    Replica {
        election,
        shutdown,
        handle,
    }
}

/// **Test:** the leader shuts down gracefully while a second replica waits.
///
/// **Reason:** a released lease lets the standby take over on its next poll
/// instead of waiting out the lease duration.
///
/// **Expectation:** the standby leads within one retry period and its loop
/// handles a floating IP added afterwards.
#[tokio::test(start_paused = true)]
async fn standby_takes_over_after_release() {
    let project = Project::with_workers(2).await;
    project.add_floating_ip(1, None).await;
    let lease = MemoryLease::new();

    let primary = start_replica(&project, &lease, "replica-a");
    sleep(Duration::from_secs(1)).await;
    let standby = start_replica(&project, &lease, "replica-b");

    sleep(Duration::from_secs(5)).await;
    assert_eq!(primary.election.get_state().await, LeaderElectionState::Leading);
    assert_eq!(standby.election.get_state().await, LeaderElectionState::Following);
    assert_eq!(project.server_of(1).await, Some(1));

    primary.shutdown.cancel();
    primary.handle.await.unwrap();
    assert_eq!(primary.election.get_state().await, LeaderElectionState::Stopped);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(standby.election.get_state().await, LeaderElectionState::Leading);
    assert_eq!(lease.holder().await.as_deref(), Some("replica-b"));

    project.add_floating_ip(2, None).await;
    sleep(Duration::from_secs(DEFAULT_RECONCILE_INTERVAL.as_secs())).await;
    assert_eq!(project.server_of(2).await, Some(2));

    standby.shutdown.cancel();
    standby.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn only_the_leader_moves_floating_ips() {
    let project = Project::with_workers(2).await;
    for id in 1..=4 {
        project.add_floating_ip(id, None).await;
    }
    let lease = MemoryLease::new();

    let replicas: Vec<Replica> = ["replica-a", "replica-b", "replica-c"]
        .iter()
        .map(|identity| start_replica(&project, &lease, identity))
        .collect();

    sleep(Duration::from_secs(95)).await;

    let mut leaders = 0;
    for replica in &replicas {
        if replica.election.get_state().await == LeaderElectionState::Leading {
            leaders += 1;
        }
    }
    assert_eq!(leaders, 1);
    // one pass placed everything; later passes by the single leader changed nothing
    assert_eq!(project.cloud.assign_calls().await.len(), 4);
    assert_eq!(project.cloud.server_listings().await, 4);

    for replica in replicas {
        replica.shutdown.cancel();
        replica.handle.await.unwrap();
    }
    assert_eq!(lease.holder().await, None);
}
