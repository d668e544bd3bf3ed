use thiserror::Error;

use crate::cluster::AddressKind;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors returned by a cloud provider client.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("api error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unable to decode response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Errors returned by a cluster API client.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster api error: {0}")]
    Api(String),

    #[error("cluster api unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by a lease backend. A lease held by someone else is not an error.
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("lease backend error: {0}")]
    Backend(String),

    #[error("lease {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("unable to list cluster members: {0}")]
    Listing(#[from] ClusterError),

    #[error("no ready cluster member reports an {0} address")]
    NoAddresses(AddressKind),
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("unable to list servers: {0}")]
    Listing(#[from] CloudError),

    #[error("no server matches any of the {addresses} cluster member addresses")]
    NoRunningServers { addresses: usize },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("unable to list floating IPs: {0}")]
    Listing(#[from] CloudError),

    #[error("configured floating IP {0} does not exist")]
    NotFound(String),
}

/// Everything that can go wrong within a single reconciliation pass.
///
/// None of these is fatal to the control loop: a failed pass is logged and the
/// next interval starts from a fresh snapshot.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("could not resolve cluster member addresses: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("could not match running servers: {0}")]
    Match(#[from] MatchError),

    #[error("could not get floating IPs: {0}")]
    Source(#[from] SourceError),

    #[error("could not update floating IP {address} after {attempts} attempts: {source}")]
    Mutation {
        address: String,
        attempts: u32,
        #[source]
        source: CloudError,
    },

    #[error("could not update floating IP {address}: got HTTP code {status}, expected {expected}")]
    UnexpectedStatus {
        address: String,
        status: u16,
        expected: u16,
    },

    #[error("reconciliation pass cancelled")]
    Cancelled,
}
