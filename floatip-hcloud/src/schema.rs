//! Wire types of the Hetzner Cloud API, trimmed to the fields the controller reads.

use floatip_core::cloud::{FloatingIp, FloatingIpType, Server};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct Meta {
    pub(crate) pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub(crate) next_page: Option<u32>,
}

/// Listing responses share the `meta.pagination` envelope.
pub(crate) trait Paginated {
    type Item;

    fn next_page(&self) -> Option<u32>;
    fn into_items(self) -> Vec<Self::Item>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerListResponse {
    pub(crate) servers: Vec<ServerSchema>,
    pub(crate) meta: Option<Meta>,
}

impl Paginated for ServerListResponse {
    type Item = ServerSchema;

    fn next_page(&self) -> Option<u32> {
        self.meta.as_ref()?.pagination.as_ref()?.next_page
    }

    fn into_items(self) -> Vec<ServerSchema> {
        self.servers
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerSchema {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) public_net: PublicNet,
    #[serde(default)]
    pub(crate) private_net: Vec<PrivateNet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublicNet {
    pub(crate) ipv4: Option<PublicIp>,
    pub(crate) ipv6: Option<PublicIp>,
    #[serde(default)]
    pub(crate) floating_ips: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublicIp {
    pub(crate) ip: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrivateNet {
    pub(crate) ip: String,
}

// Servers get a whole /64; the node itself answers on the first host address.
fn primary_ipv6(network: &str) -> Option<String> {
    let (base, _) = network.split_once('/')?;
    base.ends_with("::").then(|| format!("{}1", base))
}

impl From<ServerSchema> for Server {
    fn from(s: ServerSchema) -> Self {
        let mut addresses = Vec::new();
        if let Some(ipv4) = s.public_net.ipv4 {
            addresses.push(ipv4.ip);
        }
        if let Some(ipv6) = s.public_net.ipv6 {
            if let Some(host) = primary_ipv6(&ipv6.ip) {
                addresses.push(host);
            }
            addresses.push(ipv6.ip);
        }
        addresses.extend(s.private_net.into_iter().map(|n| n.ip));

        Server {
            id: s.id,
            name: s.name,
            addresses,
            floating_ips: s.public_net.floating_ips,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIpListResponse {
    pub(crate) floating_ips: Vec<FloatingIpSchema>,
    pub(crate) meta: Option<Meta>,
}

impl Paginated for FloatingIpListResponse {
    type Item = FloatingIpSchema;

    fn next_page(&self) -> Option<u32> {
        self.meta.as_ref()?.pagination.as_ref()?.next_page
    }

    fn into_items(self) -> Vec<FloatingIpSchema> {
        self.floating_ips
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIpSchema {
    pub(crate) id: u64,
    pub(crate) name: Option<String>,
    pub(crate) ip: String,
    #[serde(rename = "type")]
    pub(crate) ip_type: FloatingIpType,
    pub(crate) server: Option<u64>,
}

impl From<FloatingIpSchema> for FloatingIp {
    fn from(f: FloatingIpSchema) -> Self {
        FloatingIp {
            id: f.id,
            name: f.name,
            address: f.ip,
            ip_type: f.ip_type,
            server: f.server,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignRequest {
    pub(crate) server: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionResponse {
    pub(crate) action: ActionSchema,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionSchema {
    pub(crate) id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) code: String,
    pub(crate) message: String,
}
