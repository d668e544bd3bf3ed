pub mod cloud;
pub mod cluster;
pub mod lease;

mod errors;
pub use errors::{
    CloudError, ClusterError, LeaseError, MatchError, ReconcileError, ResolutionError, Result,
    SourceError,
};

pub mod memory;
