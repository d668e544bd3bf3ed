use floatip_core::cloud::{FloatingIp, FloatingIpId, Server, ServerId};
use std::collections::HashMap;
use tracing::trace;

/// Decision to route one floating IP to one running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub floating_ip: FloatingIpId,
    pub address: String,
    pub previous_server: Option<ServerId>,
    pub server: ServerId,
    pub server_name: String,
}

/// Plan the assignments of a single pass.
///
/// A floating IP is left alone when it is already routed to a running server.
/// Otherwise it goes to the running server holding the fewest floating IPs, the
/// first one in `running` order on ties. The per-server counts start from the
/// snapshot and are bumped after every decision, so a batch of unassigned IPs is
/// spread round-robin instead of piling up on the server that was emptiest at the
/// start of the pass.
pub fn plan_assignments(floating_ips: &[FloatingIp], running: &[Server]) -> Vec<Assignment> {
    let mut load: HashMap<ServerId, usize> = running
        .iter()
        .map(|s| (s.id, s.floating_ips.len()))
        .collect();

    let mut plan = Vec::new();
    for fip in floating_ips {
        if let Some(current) = fip.server {
            if load.contains_key(&current) {
                trace!(floating_ip = %fip.address, server = current, "floating IP already on a running server");
                continue;
            }
        }

        let Some(target) = least_loaded(running, &load) else {
            break;
        };
        *load.entry(target.id).or_default() += 1;

        plan.push(Assignment {
            floating_ip: fip.id,
            address: fip.address.clone(),
            previous_server: fip.server,
            server: target.id,
            server_name: target.name.clone(),
        });
    }
    plan
}

fn least_loaded<'a>(running: &'a [Server], load: &HashMap<ServerId, usize>) -> Option<&'a Server> {
    // min_by_key keeps the first of several equal minimums
    running
        .iter()
        .min_by_key(|s| load.get(&s.id).copied().unwrap_or_default())
}

#[cfg(test)]
#[path = "balancer_test.rs"]
mod tests;
