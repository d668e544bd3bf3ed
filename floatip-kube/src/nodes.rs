use async_trait::async_trait;
use floatip_core::cluster::{Address, AddressKind, ClusterApi, ClusterMember};
use floatip_core::ClusterError;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::trace;

/// KubeCluster lists the nodes of the cluster the controller runs in.
#[derive(Clone)]
pub struct KubeCluster {
    nodes: Api<Node>,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client),
        }
    }
}

fn address_kind(node_address_type: &str) -> Option<AddressKind> {
    match node_address_type {
        "InternalIP" => Some(AddressKind::Internal),
        "ExternalIP" => Some(AddressKind::External),
        _ => None,
    }
}

pub(crate) fn member_from_node(node: &Node) -> ClusterMember {
    let name = node.metadata.name.clone().unwrap_or_default();
    let status = node.status.as_ref();

    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);

    let addresses = status
        .and_then(|s| s.addresses.as_ref())
        .map(|addresses| {
            addresses
                .iter()
                .filter_map(|a| address_kind(&a.type_).map(|kind| Address::new(kind, a.address.clone())))
                .collect()
        })
        .unwrap_or_default();

    ClusterMember {
        name,
        ready,
        addresses,
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_members(&self) -> Result<Vec<ClusterMember>, ClusterError> {
        let nodes = self
            .nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) => ClusterError::Api(format!("{} ({})", ae.message, ae.code)),
                other => ClusterError::Unavailable(other.to_string()),
            })?;

        let members: Vec<ClusterMember> = nodes.items.iter().map(member_from_node).collect();
        trace!(count = members.len(), "listed cluster nodes");
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeCondition, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn node(name: &str, ready: &str, addresses: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: None,
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: ready.to_string(),
                    ..Default::default()
                }]),
                addresses: Some(
                    addresses
                        .iter()
                        .map(|(t, a)| NodeAddress {
                            type_: t.to_string(),
                            address: a.to_string(),
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn ready_node_with_both_address_kinds() {
        let member = member_from_node(&node(
            "worker-1",
            "True",
            &[
                ("Hostname", "worker-1"),
                ("InternalIP", "10.0.0.2"),
                ("ExternalIP", "1.2.3.4"),
            ],
        ));
        assert!(member.ready);
        assert_eq!(member.name, "worker-1");
        assert_eq!(member.address_of(AddressKind::Internal), Some("10.0.0.2"));
        assert_eq!(member.address_of(AddressKind::External), Some("1.2.3.4"));
        assert_eq!(member.addresses.len(), 2);
    }

    #[test]
    fn not_ready_node() {
        let member = member_from_node(&node("worker-2", "Unknown", &[("InternalIP", "10.0.0.3")]));
        assert!(!member.ready);
    }

    #[test]
    fn node_without_status() {
        let member = member_from_node(&Node::default());
        assert!(!member.ready);
        assert!(member.addresses.is_empty());
    }
}
