//! In-memory implementations of the provider traits.
//!
//! SHOULD BE USED ONLY FOR TESTING PURPOSES. Every backend can be told to fail so the
//! reconciliation and leader election paths can be exercised without a real cloud.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::cloud::{
    AssignResponse, CloudProvider, FloatingIp, FloatingIpId, Server, ServerId,
    ASSIGN_SUCCESS_STATUS,
};
use crate::cluster::{ClusterApi, ClusterMember};
use crate::lease::{evaluate, LeaseDecision, LeaseLock};
use crate::{CloudError, ClusterError, LeaseError};

/// How the assign call for one floating IP misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignFailure {
    /// Every call fails with HTTP 503.
    Unavailable,
    /// The next `n` calls fail with HTTP 503, later calls succeed.
    UnavailableTimes(u32),
    /// Calls return without error but report this status code.
    Status(u16),
}

fn unavailable() -> CloudError {
    CloudError::Api {
        status: 503,
        code: "unavailable".to_string(),
        message: "Service Unavailable".to_string(),
    }
}

fn not_found(what: &str, id: u64) -> CloudError {
    CloudError::Api {
        status: 404,
        code: "not_found".to_string(),
        message: format!("{} with ID {} not found", what, id),
    }
}

#[derive(Debug, Default)]
struct CloudState {
    servers: Vec<Server>,
    floating_ips: Vec<FloatingIp>,
    assign_calls: Vec<(FloatingIpId, ServerId)>,
    assign_failures: HashMap<FloatingIpId, AssignFailure>,
    fail_server_listing: bool,
    fail_floating_ip_listing: bool,
    server_listings: usize,
    next_action: u64,
}

/// MemoryCloud keeps servers and floating IPs in memory and applies assign calls to them.
#[derive(Debug, Clone, Default)]
pub struct MemoryCloud {
    inner: Arc<Mutex<CloudState>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_server(&self, server: Server) {
        self.inner.lock().await.servers.push(server);
    }

    /// Adds a floating IP; when it is assigned, the owning server's list is updated too.
    pub async fn add_floating_ip(&self, floating_ip: FloatingIp) {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        if let Some(server_id) = floating_ip.server {
            if let Some(server) = state.servers.iter_mut().find(|s| s.id == server_id) {
                if !server.floating_ips.contains(&floating_ip.id) {
                    server.floating_ips.push(floating_ip.id);
                }
            }
        }
        state.floating_ips.push(floating_ip);
    }

    pub async fn set_assign_failure(&self, floating_ip: FloatingIpId, failure: AssignFailure) {
        self.inner
            .lock()
            .await
            .assign_failures
            .insert(floating_ip, failure);
    }

    pub async fn clear_assign_failure(&self, floating_ip: FloatingIpId) {
        self.inner.lock().await.assign_failures.remove(&floating_ip);
    }

    pub async fn set_fail_server_listing(&self, fail: bool) {
        self.inner.lock().await.fail_server_listing = fail;
    }

    pub async fn set_fail_floating_ip_listing(&self, fail: bool) {
        self.inner.lock().await.fail_floating_ip_listing = fail;
    }

    /// Every assign call received so far, failed ones included.
    pub async fn assign_calls(&self) -> Vec<(FloatingIpId, ServerId)> {
        self.inner.lock().await.assign_calls.clone()
    }

    /// Number of server listings served, a cheap proxy for "passes started".
    pub async fn server_listings(&self) -> usize {
        self.inner.lock().await.server_listings
    }

    pub async fn floating_ip(&self, id: FloatingIpId) -> Option<FloatingIp> {
        self.inner
            .lock()
            .await
            .floating_ips
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    pub async fn server(&self, id: ServerId) -> Option<Server> {
        self.inner
            .lock()
            .await
            .servers
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

#[async_trait]
impl CloudProvider for MemoryCloud {
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError> {
        let mut state = self.inner.lock().await;
        state.server_listings += 1;
        if state.fail_server_listing {
            return Err(unavailable());
        }
        Ok(state.servers.clone())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, CloudError> {
        let state = self.inner.lock().await;
        if state.fail_floating_ip_listing {
            return Err(unavailable());
        }
        Ok(state.floating_ips.clone())
    }

    async fn assign_floating_ip(
        &self,
        floating_ip: FloatingIpId,
        server: ServerId,
    ) -> Result<AssignResponse, CloudError> {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        state.assign_calls.push((floating_ip, server));

        match state.assign_failures.get_mut(&floating_ip) {
            Some(AssignFailure::Unavailable) => return Err(unavailable()),
            Some(AssignFailure::UnavailableTimes(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                return Err(unavailable());
            }
            Some(AssignFailure::Status(status)) => {
                return Ok(AssignResponse {
                    status: *status,
                    action_id: None,
                })
            }
            _ => {}
        }

        if !state.servers.iter().any(|s| s.id == server) {
            return Err(not_found("server", server));
        }
        let previous = match state.floating_ips.iter_mut().find(|f| f.id == floating_ip) {
            Some(fip) => fip.server.replace(server),
            None => return Err(not_found("floating IP", floating_ip)),
        };

        for s in state.servers.iter_mut() {
            if Some(s.id) == previous {
                s.floating_ips.retain(|id| *id != floating_ip);
            }
            if s.id == server && !s.floating_ips.contains(&floating_ip) {
                s.floating_ips.push(floating_ip);
            }
        }

        state.next_action += 1;
        Ok(AssignResponse {
            status: ASSIGN_SUCCESS_STATUS,
            action_id: Some(state.next_action),
        })
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    members: Vec<ClusterMember>,
    fail_listing: bool,
}

/// MemoryCluster serves a fixed list of members that tests can change between passes.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_members(&self, members: Vec<ClusterMember>) {
        self.inner.lock().await.members = members;
    }

    pub async fn set_fail_listing(&self, fail: bool) {
        self.inner.lock().await.fail_listing = fail;
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn list_members(&self) -> Result<Vec<ClusterMember>, ClusterError> {
        let state = self.inner.lock().await;
        if state.fail_listing {
            return Err(ClusterError::Unavailable(
                "the server is currently unable to handle the request".to_string(),
            ));
        }
        Ok(state.members.clone())
    }
}

#[derive(Debug, Default)]
struct LeaseState {
    holder: Option<String>,
    renewed_at: Option<Instant>,
    ttl: Duration,
    transitions: u32,
    fail_renewals: bool,
}

impl LeaseState {
    fn expired(&self) -> bool {
        match self.renewed_at {
            Some(at) => at + self.ttl <= Instant::now(),
            None => true,
        }
    }
}

/// MemoryLease is a single lease record shared by every clone, using tokio time so
/// tests can pause the clock and step through expiry.
#[derive(Debug, Clone, Default)]
pub struct MemoryLease {
    inner: Arc<Mutex<LeaseState>>,
}

impl MemoryLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn holder(&self) -> Option<String> {
        self.inner.lock().await.holder.clone()
    }

    pub async fn transitions(&self) -> u32 {
        self.inner.lock().await.transitions
    }

    /// Make every renewal fail with a backend error, as if the store were unreachable.
    pub async fn set_fail_renewals(&self, fail: bool) {
        self.inner.lock().await.fail_renewals = fail;
    }

    /// Hand the lease to `identity` regardless of the current holder.
    pub async fn force_holder(&self, identity: &str, ttl: Duration) {
        let mut state = self.inner.lock().await;
        state.holder = Some(identity.to_string());
        state.renewed_at = Some(Instant::now());
        state.ttl = ttl;
        state.transitions += 1;
    }
}

#[async_trait]
impl LeaseLock for MemoryLease {
    async fn acquire(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let mut state = self.inner.lock().await;
        let expired = state.expired();
        match evaluate(state.holder.as_deref(), expired, identity) {
            LeaseDecision::HeldBy(_) => Ok(false),
            LeaseDecision::Renew => {
                state.renewed_at = Some(Instant::now());
                state.ttl = ttl;
                Ok(true)
            }
            LeaseDecision::TakeOver => {
                state.holder = Some(identity.to_string());
                state.renewed_at = Some(Instant::now());
                state.ttl = ttl;
                state.transitions += 1;
                Ok(true)
            }
        }
    }

    async fn renew(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let mut state = self.inner.lock().await;
        if state.fail_renewals {
            return Err(LeaseError::Backend("lease store unreachable".to_string()));
        }
        if state.holder.as_deref() != Some(identity) {
            return Ok(false);
        }
        state.renewed_at = Some(Instant::now());
        state.ttl = ttl;
        Ok(true)
    }

    async fn release(&self, identity: &str) -> Result<(), LeaseError> {
        let mut state = self.inner.lock().await;
        if state.holder.as_deref() == Some(identity) {
            state.holder = None;
            state.renewed_at = None;
        }
        Ok(())
    }
}
