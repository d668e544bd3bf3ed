//! Kubernetes backends for the floatip controller.
//!
//! [`KubeCluster`] reports cluster nodes as members, [`KubeLeaseLock`] implements
//! leader election on a `coordination.k8s.io/v1` Lease object.

mod lease;
mod nodes;

pub use lease::KubeLeaseLock;
pub use nodes::KubeCluster;

pub use kube::Client;

/// Build a client from the in-cluster service account or the local kubeconfig.
pub async fn default_client() -> Result<Client, kube::Error> {
    Client::try_default().await
}
