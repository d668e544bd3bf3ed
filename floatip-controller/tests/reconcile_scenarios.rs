//! Whole reconciliation passes against the in-memory backends.

mod common;

use std::collections::HashMap;

use common::Project;
use floatip_core::cluster::ClusterApi;
use floatip_core::memory::AssignFailure;
use floatip_core::{ReconcileError, ResolutionError};
use tokio_util::sync::CancellationToken;

/// **Test:** one running server and one unassigned floating IP.
///
/// **Expectation:** a single assign call targeting that server, pass succeeds.
#[tokio::test(start_paused = true)]
async fn single_server_gets_the_floating_ip() {
    let project = Project::with_workers(1).await;
    project.add_floating_ip(1, None).await;

    let report = project
        .reconciler()
        .reconcile(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(project.cloud.assign_calls().await, vec![(1, 1)]);
    assert_eq!(report.assigned.len(), 1);
    assert!(report.failed.is_empty());
}

/// **Test:** three floating IPs on one server, the second one can never be assigned.
///
/// **Reason:** a failing floating IP must not hold back the others.
///
/// **Expectation:** IPs 1 and 3 are assigned, IP 2 stays unassigned after the
/// retries run out, and the pass itself succeeds.
#[tokio::test(start_paused = true)]
async fn partial_failure_does_not_fail_the_pass() {
    let project = Project::with_workers(1).await;
    for id in 1..=3 {
        project.add_floating_ip(id, None).await;
    }
    project
        .cloud
        .set_assign_failure(2, AssignFailure::Unavailable)
        .await;

    let report = project
        .reconciler()
        .reconcile(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(project.server_of(1).await, Some(1));
    assert_eq!(project.server_of(2).await, None);
    assert_eq!(project.server_of(3).await, Some(1));

    assert_eq!(report.assigned.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].assignment.floating_ip, 2);
    assert!(matches!(
        report.failed[0].error,
        ReconcileError::Mutation { attempts: 3, .. }
    ));

    let calls = project.cloud.assign_calls().await;
    assert_eq!(calls.iter().filter(|(fip, _)| *fip == 2).count(), 3);
}

/// **Test:** servers holding 0 and 2 floating IPs, and a new unassigned one.
///
/// **Expectation:** the new floating IP goes to the empty server.
#[tokio::test(start_paused = true)]
async fn new_floating_ip_goes_to_least_loaded_server() {
    let project = Project::with_workers(2).await;
    project.add_floating_ip(1, Some(2)).await;
    project.add_floating_ip(2, Some(2)).await;
    project.add_floating_ip(3, None).await;

    project
        .reconciler()
        .reconcile(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(project.cloud.assign_calls().await, vec![(3, 1)]);
}

#[tokio::test(start_paused = true)]
async fn no_ready_members_fails_before_any_mutation() {
    let project = Project::with_workers(2).await;
    project.add_floating_ip(1, None).await;
    project.cluster.set_members(vec![]).await;

    let err = project
        .reconciler()
        .reconcile(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Resolution(ResolutionError::NoAddresses(_))
    ));
    assert!(project.cloud.assign_calls().await.is_empty());
}

/// **Test:** floating IPs parked on a server outside the cluster plus unassigned ones.
///
/// **Expectation:** after the pass every floating IP sits on a running server and
/// the new assignments are spread one per server before any server gets a second.
#[tokio::test(start_paused = true)]
async fn every_floating_ip_ends_on_a_running_server() {
    let project = Project::with_workers(3).await;
    project.add_stray_server(50).await;
    for id in 1..=3 {
        project.add_floating_ip(id, Some(50)).await;
    }
    for id in 4..=6 {
        project.add_floating_ip(id, None).await;
    }

    let report = project
        .reconciler()
        .reconcile(&CancellationToken::new())
        .await
        .unwrap();
    assert!(report.failed.is_empty());

    let mut per_server: HashMap<u64, usize> = HashMap::new();
    for id in 1..=6 {
        let server = project.server_of(id).await.unwrap();
        assert!((1..=3).contains(&server), "fip {} left on {}", id, server);
        *per_server.entry(server).or_default() += 1;
    }
    assert_eq!(per_server.values().copied().collect::<Vec<_>>(), vec![2, 2, 2]);

    // the first three new assignments cover all three servers
    let first_round: Vec<u64> = report.assigned[..3].iter().map(|a| a.server).collect();
    let mut sorted = first_round.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn second_pass_over_unchanged_state_is_a_no_op() {
    let project = Project::with_workers(2).await;
    for id in 1..=5 {
        project.add_floating_ip(id, None).await;
    }
    let reconciler = project.reconciler();

    reconciler.reconcile(&CancellationToken::new()).await.unwrap();
    let after_first = project.cloud.assign_calls().await.len();
    assert_eq!(after_first, 5);

    let report = reconciler.reconcile(&CancellationToken::new()).await.unwrap();
    assert!(report.assigned.is_empty());
    assert_eq!(project.cloud.assign_calls().await.len(), after_first);
}

/// **Test:** a node stops being ready between two passes.
///
/// **Expectation:** its floating IPs move to the remaining servers on the next pass.
#[tokio::test(start_paused = true)]
async fn floating_ips_follow_ready_nodes() {
    let project = Project::with_workers(2).await;
    project.add_floating_ip(1, None).await;
    project.add_floating_ip(2, None).await;
    let reconciler = project.reconciler();

    reconciler.reconcile(&CancellationToken::new()).await.unwrap();
    assert_eq!(project.server_of(1).await, Some(1));
    assert_eq!(project.server_of(2).await, Some(2));

    let mut members = project.cluster.list_members().await.unwrap();
    members.retain(|m| m.name != "worker-2");
    project.cluster.set_members(members).await;

    reconciler.reconcile(&CancellationToken::new()).await.unwrap();
    assert_eq!(project.server_of(1).await, Some(1));
    assert_eq!(project.server_of(2).await, Some(1));
}
