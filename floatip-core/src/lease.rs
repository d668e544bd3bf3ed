use async_trait::async_trait;
use std::time::Duration;

use crate::LeaseError;

/// A time-bounded, renewable lock used to elect a single active controller.
///
/// Backends only have to store who holds the lease and when it was last renewed;
/// the rules for who may take it are shared through [`evaluate`].
#[async_trait]
pub trait LeaseLock: Send + Sync + 'static {
    /// Try to become the holder. Returns `Ok(false)` while another identity holds an
    /// unexpired lease.
    async fn acquire(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError>;

    /// Extend a lease already held by `identity`. Returns `Ok(false)` if the lease
    /// has been taken over in the meantime.
    async fn renew(&self, identity: &str, ttl: Duration) -> Result<bool, LeaseError>;

    /// Give the lease up so another identity can take it without waiting for expiry.
    /// Releasing a lease held by someone else is a no-op.
    async fn release(&self, identity: &str) -> Result<(), LeaseError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseDecision {
    /// `identity` already holds the lease and only has to refresh it.
    Renew,
    /// The lease is free or expired and `identity` may take it.
    TakeOver,
    /// Someone else holds an unexpired lease.
    HeldBy(String),
}

pub fn evaluate(holder: Option<&str>, expired: bool, identity: &str) -> LeaseDecision {
    match holder {
        None | Some("") => LeaseDecision::TakeOver,
        Some(h) if h == identity => LeaseDecision::Renew,
        Some(_) if expired => LeaseDecision::TakeOver,
        Some(h) => LeaseDecision::HeldBy(h.to_owned()),
    }
}
