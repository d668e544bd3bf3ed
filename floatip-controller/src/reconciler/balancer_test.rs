//! Unit tests for assignment planning.
//!
//! The planner is pure, so every case builds a snapshot by hand and checks the
//! decisions without any backend.

use super::*;
use floatip_core::cloud::FloatingIpType;

fn server(id: ServerId, floating_ips: &[FloatingIpId]) -> Server {
    Server {
        id,
        name: format!("server-{}", id),
        addresses: vec![format!("10.0.0.{}", id)],
        floating_ips: floating_ips.to_vec(),
    }
}

fn fip(id: FloatingIpId, server: Option<ServerId>) -> FloatingIp {
    FloatingIp {
        id,
        name: None,
        address: format!("192.0.2.{}", id),
        ip_type: FloatingIpType::Ipv4,
        server,
    }
}

fn targets(plan: &[Assignment]) -> Vec<(FloatingIpId, ServerId)> {
    plan.iter().map(|a| (a.floating_ip, a.server)).collect()
}

/// **Test:** one running server, one unassigned floating IP.
///
/// **Expectation:** exactly one decision, targeting that server.
#[test]
fn single_unassigned_ip_goes_to_only_server() {
    let plan = plan_assignments(&[fip(1, None)], &[server(10, &[])]);
    assert_eq!(targets(&plan), vec![(1, 10)]);
    assert_eq!(plan[0].server_name, "server-10");
    assert_eq!(plan[0].previous_server, None);
}

/// **Test:** servers holding 0 and 2 floating IPs, a new unassigned IP arrives.
///
/// **Expectation:** the empty server wins even though it is listed second.
#[test]
fn new_ip_goes_to_least_loaded_server() {
    let running = [server(1, &[100, 101]), server(2, &[])];
    let floating_ips = [fip(100, Some(1)), fip(101, Some(1)), fip(5, None)];

    let plan = plan_assignments(&floating_ips, &running);
    assert_eq!(targets(&plan), vec![(5, 2)]);
}

/// **Test:** k unassigned IPs over n >= k running servers with equal load.
///
/// **Reason:** the in-pass counter must be bumped after each decision, otherwise
/// every IP would land on the first server.
///
/// **Expectation:** no server gets a second IP before every server has one, in
/// listing order.
#[test]
fn unassigned_ips_spread_round_robin() {
    let running = [server(1, &[]), server(2, &[]), server(3, &[])];
    let floating_ips = [fip(1, None), fip(2, None), fip(3, None)];

    let plan = plan_assignments(&floating_ips, &running);
    assert_eq!(targets(&plan), vec![(1, 1), (2, 2), (3, 3)]);
}

#[test]
fn round_robin_wraps_once_every_server_has_one() {
    let running = [server(1, &[]), server(2, &[])];
    let floating_ips: Vec<FloatingIp> = (1..=5).map(|id| fip(id, None)).collect();

    let plan = plan_assignments(&floating_ips, &running);
    assert_eq!(
        targets(&plan),
        vec![(1, 1), (2, 2), (3, 1), (4, 2), (5, 1)]
    );
}

/// **Test:** an IP routed to a server that is no longer running.
///
/// **Expectation:** it is moved, and the previous server is recorded for logging.
#[test]
fn ip_on_dead_server_is_moved() {
    let running = [server(2, &[])];
    let plan = plan_assignments(&[fip(7, Some(99))], &running);

    assert_eq!(targets(&plan), vec![(7, 2)]);
    assert_eq!(plan[0].previous_server, Some(99));
}

/// **Test:** every IP already sits on a running server, even if unevenly.
///
/// **Expectation:** nothing is planned; correct assignments are never rebalanced.
#[test]
fn correct_assignments_are_left_alone() {
    let running = [server(1, &[1, 2, 3]), server(2, &[])];
    let floating_ips = [fip(1, Some(1)), fip(2, Some(1)), fip(3, Some(1))];

    assert!(plan_assignments(&floating_ips, &running).is_empty());
}

/// **Test:** correctly assigned IPs interleaved with ones needing a move.
///
/// **Expectation:** skipped IPs do not bump any counter, moved ones follow the
/// snapshot counts (server 2 starts with one IP, server 3 with none).
#[test]
fn skipped_ips_do_not_change_counts() {
    let running = [server(1, &[1]), server(2, &[2]), server(3, &[])];
    let floating_ips = [
        fip(1, Some(1)),
        fip(4, None),
        fip(2, Some(2)),
        fip(5, Some(42)),
        fip(6, None),
    ];

    let plan = plan_assignments(&floating_ips, &running);
    assert_eq!(targets(&plan), vec![(4, 3), (5, 1), (6, 2)]);
}

#[test]
fn ties_break_on_listing_order() {
    let running = [server(9, &[1]), server(3, &[2]), server(5, &[3])];
    let plan = plan_assignments(&[fip(4, None)], &running);
    assert_eq!(targets(&plan), vec![(4, 9)]);
}

#[test]
fn no_running_servers_means_no_plan() {
    assert!(plan_assignments(&[fip(1, None)], &[]).is_empty());
}

/// **Test:** applying a plan and planning again on the resulting snapshot.
///
/// **Expectation:** the second plan is empty.
#[test]
fn planning_is_idempotent_once_applied() {
    let mut running = vec![server(1, &[]), server(2, &[])];
    let mut floating_ips = vec![fip(1, None), fip(2, Some(77)), fip(3, None)];

    for a in plan_assignments(&floating_ips, &running) {
        let f = floating_ips.iter_mut().find(|f| f.id == a.floating_ip).unwrap();
        f.server = Some(a.server);
        running
            .iter_mut()
            .find(|s| s.id == a.server)
            .unwrap()
            .floating_ips
            .push(a.floating_ip);
    }

    assert!(plan_assignments(&floating_ips, &running).is_empty());
}
