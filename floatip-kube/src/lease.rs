use async_trait::async_trait;
use floatip_core::lease::{evaluate, LeaseDecision, LeaseLock};
use floatip_core::LeaseError;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use k8s_openapi::chrono::{DateTime, Utc};
use kube::api::{Api, PostParams};
use kube::Client;
use std::time::Duration;
use tracing::debug;

const CONFLICT: u16 = 409;

/// KubeLeaseLock stores leadership in a `coordination.k8s.io/v1` Lease.
///
/// Writes go through `replace` with the `resourceVersion` that was read, so two
/// replicas racing for the same lease cannot both win; the loser sees a conflict
/// and reports the lease as not acquired.
#[derive(Clone)]
pub struct KubeLeaseLock {
    leases: Api<Lease>,
    name: String,
}

impl std::fmt::Debug for KubeLeaseLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeLeaseLock")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn backend(e: kube::Error) -> LeaseError {
    LeaseError::Backend(e.to_string())
}

fn is_conflict(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(ae) if ae.code == CONFLICT)
}

fn ttl_seconds(ttl: Duration) -> i32 {
    ttl.as_secs().clamp(1, i32::MAX as u64) as i32
}

/// Whether the lease described by `spec` has run out at `now`.
pub(crate) fn is_expired(spec: &LeaseSpec, now: DateTime<Utc>) -> bool {
    let (Some(renewed), Some(seconds)) = (spec.renew_time.as_ref(), spec.lease_duration_seconds)
    else {
        return true;
    };
    renewed.0 + k8s_openapi::chrono::Duration::seconds(i64::from(seconds)) <= now
}

/// Apply a successful acquisition or renewal to `spec`.
pub(crate) fn claim(
    spec: &mut LeaseSpec,
    decision: &LeaseDecision,
    identity: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) {
    if *decision == LeaseDecision::TakeOver {
        spec.holder_identity = Some(identity.to_string());
        spec.acquire_time = Some(MicroTime(now));
        spec.lease_transitions = Some(spec.lease_transitions.unwrap_or(0) + 1);
    }
    spec.renew_time = Some(MicroTime(now));
    spec.lease_duration_seconds = Some(ttl_seconds(ttl));
}

impl KubeLeaseLock {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            leases: Api::namespaced(client, namespace),
            name: name.to_string(),
        }
    }

    async fn create(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let now = Utc::now();
        let lease = Lease {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(identity.to_string()),
                lease_duration_seconds: Some(ttl_seconds(ttl)),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(0),
                ..Default::default()
            }),
        };
        match self.leases.create(&PostParams::default(), &lease).await {
            Ok(_) => Ok(true),
            // someone else created it between our read and write
            Err(e) if is_conflict(&e) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn replace(&self, lease: &Lease) -> Result<bool, LeaseError> {
        match self
            .leases
            .replace(&self.name, &PostParams::default(), lease)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_conflict(&e) => {
                debug!(lease = %self.name, "lease update lost a write race");
                Ok(false)
            }
            Err(e) => Err(backend(e)),
        }
    }
}

#[async_trait]
impl LeaseLock for KubeLeaseLock {
    async fn acquire(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let Some(mut lease) = self.leases.get_opt(&self.name).await.map_err(backend)? else {
            return self.create(identity, ttl).await;
        };

        let now = Utc::now();
        let spec = lease.spec.get_or_insert_with(LeaseSpec::default);
        let decision = evaluate(spec.holder_identity.as_deref(), is_expired(spec, now), identity);
        if let LeaseDecision::HeldBy(holder) = &decision {
            debug!(lease = %self.name, holder = %holder, "lease is held by another replica");
            return Ok(false);
        }
        claim(spec, &decision, identity, ttl, now);
        self.replace(&lease).await
    }

    async fn renew(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let Some(mut lease) = self.leases.get_opt(&self.name).await.map_err(backend)? else {
            return Ok(false);
        };

        let spec = lease.spec.get_or_insert_with(LeaseSpec::default);
        if spec.holder_identity.as_deref() != Some(identity) {
            return Ok(false);
        }
        claim(spec, &LeaseDecision::Renew, identity, ttl, Utc::now());
        self.replace(&lease).await
    }

    async fn release(&self, identity: &str) -> Result<(), LeaseError> {
        let Some(mut lease) = self.leases.get_opt(&self.name).await.map_err(backend)? else {
            return Ok(());
        };

        let Some(spec) = lease.spec.as_mut() else {
            return Ok(());
        };
        if spec.holder_identity.as_deref() != Some(identity) {
            return Ok(());
        }
        spec.holder_identity = None;
        spec.lease_duration_seconds = Some(1);
        spec.renew_time = Some(MicroTime(Utc::now()));
        self.replace(&lease).await.map(|_| ())
    }
}
