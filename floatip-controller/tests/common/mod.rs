//! Shared fixtures for the `floatip-controller` integration tests.
//!
//! Builds a small project on the in-memory backends: every worker is a ready
//! cluster member whose external address is also the address of a cloud server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use floatip_controller::{Backoff, ReconcileSettings, Reconciler};
use floatip_core::cloud::{FloatingIp, FloatingIpType, Server};
use floatip_core::cluster::{Address, AddressKind, ClusterMember};
use floatip_core::memory::{MemoryCloud, MemoryCluster};

pub struct Project {
    pub cloud: MemoryCloud,
    pub cluster: MemoryCluster,
}

fn worker_address(id: u64) -> String {
    format!("198.51.100.{}", id)
}

impl Project {
    /// `workers` servers with ids 1..=workers, each backing a ready node.
    pub async fn with_workers(workers: u64) -> Self {
        let cloud = MemoryCloud::new();
        let mut members = Vec::new();
        for id in 1..=workers {
            cloud
                .add_server(Server {
                    id,
                    name: format!("worker-{}", id),
                    addresses: vec![worker_address(id), format!("10.0.0.{}", id)],
                    floating_ips: vec![],
                })
                .await;
            members.push(ClusterMember {
                name: format!("worker-{}", id),
                ready: true,
                addresses: vec![
                    Address::new(AddressKind::Internal, format!("10.0.0.{}", id)),
                    Address::new(AddressKind::External, worker_address(id)),
                ],
            });
        }

        let cluster = MemoryCluster::new();
        cluster.set_members(members).await;
        Self { cloud, cluster }
    }

    /// Floating IP `id` with address 192.0.2.`id`, optionally already on a server.
    pub async fn add_floating_ip(&self, id: u64, server: Option<u64>) {
        self.cloud
            .add_floating_ip(FloatingIp {
                id,
                name: Some(format!("fip-{}", id)),
                address: format!("192.0.2.{}", id),
                ip_type: FloatingIpType::Ipv4,
                server,
            })
            .await;
    }

    /// Add a server no cluster member points at.
    pub async fn add_stray_server(&self, id: u64) {
        self.cloud
            .add_server(Server {
                id,
                name: format!("stray-{}", id),
                addresses: vec![format!("203.0.113.{}", id)],
                floating_ips: vec![],
            })
            .await;
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::new(self.cloud.clone()),
            Arc::new(self.cluster.clone()),
            ReconcileSettings {
                address_kind: AddressKind::External,
                floating_ips: vec![],
                backoff: fast_backoff(),
            },
        )
    }

    pub async fn server_of(&self, floating_ip: u64) -> Option<u64> {
        self.cloud.floating_ip(floating_ip).await.and_then(|f| f.server)
    }
}

pub fn fast_backoff() -> Backoff {
    Backoff {
        duration: Duration::from_millis(100),
        factor: 1.5,
        steps: 3,
    }
}
