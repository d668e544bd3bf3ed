use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ClusterError;

/// Kind of node address used to match cluster members against cloud servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Internal,
    External,
}

impl Default for AddressKind {
    fn default() -> Self {
        Self::External
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Internal => write!(f, "internal"),
            AddressKind::External => write!(f, "external"),
        }
    }
}

impl FromStr for AddressKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" | "internalip" => Ok(AddressKind::Internal),
            "external" | "externalip" => Ok(AddressKind::External),
            other => Err(format!(
                "unknown address type '{}', expected 'internal' or 'external'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub kind: AddressKind,
    pub address: String,
}

impl Address {
    pub fn new(kind: AddressKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

/// A node of the compute cluster as reported by the cluster API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub name: String,
    pub ready: bool,
    pub addresses: Vec<Address>,
}

impl ClusterMember {
    /// First address of the given kind, in the order the cluster API reported them.
    pub fn address_of(&self, kind: AddressKind) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.address.as_str())
    }
}

#[async_trait]
pub trait ClusterApi: Send + Sync + 'static {
    /// List every member of the cluster, ready or not.
    async fn list_members(&self) -> Result<Vec<ClusterMember>, ClusterError>;
}
