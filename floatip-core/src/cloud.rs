use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::CloudError;

pub type ServerId = u64;
pub type FloatingIpId = u64;

/// HTTP status the provider answers a successful assign action with.
pub const ASSIGN_SUCCESS_STATUS: u16 = 201;

/// A compute instance of the cloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    /// Every address the instance is reachable on (public and private networks).
    pub addresses: Vec<String>,
    /// Floating IPs currently assigned to the instance.
    pub floating_ips: Vec<FloatingIpId>,
}

impl Server {
    pub fn has_address(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatingIpType {
    Ipv4,
    Ipv6,
}

impl fmt::Display for FloatingIpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatingIpType::Ipv4 => write!(f, "ipv4"),
            FloatingIpType::Ipv6 => write!(f, "ipv6"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: FloatingIpId,
    pub name: Option<String>,
    pub address: String,
    pub ip_type: FloatingIpType,
    /// Server the address is routed to, `None` while unassigned.
    pub server: Option<ServerId>,
}

impl FloatingIp {
    /// Whether a configured address refers to this floating IP.
    ///
    /// IPv6 floating IPs are a whole network (`2001:db8:1::/64`). The network
    /// itself, its base address or any address inside it all name the same IP.
    pub fn matches_address(&self, configured: &str) -> bool {
        let (Some((own, prefix)), Some((wanted, _))) =
            (parse_floating_address(&self.address), parse_floating_address(configured))
        else {
            return false;
        };
        match (own, wanted, prefix) {
            (IpAddr::V6(own), IpAddr::V6(wanted), Some(len)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
                u128::from(own) & mask == u128::from(wanted) & mask
            }
            _ => own == wanted,
        }
    }
}

/// Parse `address` or `address/prefix` as the provider reports floating IPs.
///
/// Returns `None` for anything that is not an IP address or carries a prefix
/// longer than the address family allows.
pub fn parse_floating_address(value: &str) -> Option<(IpAddr, Option<u8>)> {
    let (address, prefix) = match value.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix.parse::<u8>().ok()?)),
        None => (value, None),
    };
    let address: IpAddr = address.parse().ok()?;
    let max = if address.is_ipv4() { 32 } else { 128 };
    match prefix {
        Some(len) if len > max => None,
        _ => Some((address, prefix)),
    }
}

/// Outcome of an assign call that did not fail at the transport or API level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignResponse {
    pub status: u16,
    pub action_id: Option<u64>,
}

#[async_trait]
pub trait CloudProvider: Send + Sync + 'static {
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError>;

    /// Every floating IP of the project, assigned or not.
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, CloudError>;

    /// Route `floating_ip` to `server`. Any previous assignment is replaced by the provider.
    async fn assign_floating_ip(
        &self,
        floating_ip: FloatingIpId,
        server: ServerId,
    ) -> Result<AssignResponse, CloudError>;
}
