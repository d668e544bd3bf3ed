use anyhow::{bail, Context, Result};
use floatip_core::cloud::parse_floating_address;
use floatip_core::cluster::AddressKind;
use floatip_hcloud::DEFAULT_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::control_loop::DEFAULT_RECONCILE_INTERVAL;
use crate::leader_election::LeaderElectionConfig;
use crate::reconciler::{Backoff, ReconcileSettings};

const MAX_BACKOFF_STEPS: u32 = 30;

/// configuration settings loaded from the config file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoadConfiguration {
    /// Hetzner Cloud API token, usually left out and given through HCLOUD_TOKEN
    #[serde(default)]
    pub hcloud_token: Option<String>,
    /// Hetzner Cloud API base URL
    #[serde(default)]
    pub hcloud_endpoint: Option<String>,
    /// Which node address identifies the server: internal or external
    #[serde(default)]
    pub node_address_type: Option<String>,
    /// Floating IPs to manage; when absent every floating IP of the project is managed
    #[serde(default)]
    pub floating_ips: Vec<String>,
    /// Seconds between reconciliation passes
    #[serde(default)]
    pub reconcile_interval_seconds: Option<u64>,
    /// Retry schedule for assign calls
    #[serde(default)]
    pub backoff: BackoffNode,
    /// Leader election over a Kubernetes Lease
    #[serde(default)]
    pub leader_election: LeaderElectionNode,
    /// Default log filter, RUST_LOG takes precedence
    #[serde(default)]
    pub log_level: Option<String>,
    /// Prometheus exporter address
    #[serde(default)]
    pub prom_exporter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffNode {
    pub duration_ms: u64,
    pub factor: f64,
    pub steps: u32,
}

impl Default for BackoffNode {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            factor: 1.2,
            steps: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderElectionNode {
    pub enabled: bool,
    pub lease_name: String,
    pub namespace: String,
    /// Defaults to the pod name
    pub identity: Option<String>,
    pub lease_duration_seconds: u64,
    pub renew_deadline_seconds: u64,
    pub retry_period_seconds: u64,
}

impl Default for LeaderElectionNode {
    fn default() -> Self {
        Self {
            enabled: true,
            lease_name: "floatip-controller".to_string(),
            namespace: "default".to_string(),
            identity: None,
            lease_duration_seconds: 15,
            renew_deadline_seconds: 10,
            retry_period_seconds: 2,
        }
    }
}

impl LoadConfiguration {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse the configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }
}

/// Where the lease lives and how this replica campaigns for it.
#[derive(Debug, Clone)]
pub struct LeaseSettings {
    pub lease_name: String,
    pub namespace: String,
    pub election: LeaderElectionConfig,
}

/// validated settings the controller runs with
#[derive(Clone)]
pub struct ServiceConfiguration {
    pub hcloud_token: String,
    pub hcloud_endpoint: String,
    pub address_kind: AddressKind,
    pub floating_ips: Vec<String>,
    pub reconcile_interval: Duration,
    pub backoff: Backoff,
    /// None when leader election is disabled and the loop runs unconditionally
    pub leader_election: Option<LeaseSettings>,
    pub log_level: String,
    pub prom_exporter: Option<SocketAddr>,
}

impl std::fmt::Debug for ServiceConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfiguration")
            .field("hcloud_token", &"<redacted>")
            .field("hcloud_endpoint", &self.hcloud_endpoint)
            .field("address_kind", &self.address_kind)
            .field("floating_ips", &self.floating_ips)
            .field("reconcile_interval", &self.reconcile_interval)
            .field("backoff", &self.backoff)
            .field("leader_election", &self.leader_election)
            .field("log_level", &self.log_level)
            .field("prom_exporter", &self.prom_exporter)
            .finish()
    }
}

impl ServiceConfiguration {
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            address_kind: self.address_kind,
            floating_ips: self.floating_ips.clone(),
            backoff: self.backoff,
        }
    }
}

/// Implementing the TryFrom trait to transform LoadConfiguration into ServiceConfiguration
impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let hcloud_token = config.hcloud_token.unwrap_or_default();
        if hcloud_token.trim().is_empty() {
            bail!("hcloud_token is required, set it in the config file or HCLOUD_TOKEN");
        }

        let address_kind = match config.node_address_type {
            Some(kind) => kind
                .parse::<AddressKind>()
                .map_err(anyhow::Error::msg)
                .context("Invalid node_address_type")?,
            None => AddressKind::default(),
        };

        for address in &config.floating_ips {
            if parse_floating_address(address).is_none() {
                bail!("Invalid floating IP address: {}", address);
            }
        }

        let interval_seconds = config
            .reconcile_interval_seconds
            .unwrap_or(DEFAULT_RECONCILE_INTERVAL.as_secs());
        if interval_seconds == 0 {
            bail!("reconcile_interval_seconds must be greater than zero");
        }

        if !config.backoff.factor.is_finite() || config.backoff.factor < 1.0 {
            bail!("backoff.factor must be a finite number of at least 1, got {}", config.backoff.factor);
        }
        if config.backoff.steps == 0 || config.backoff.steps > MAX_BACKOFF_STEPS {
            bail!(
                "backoff.steps must be between 1 and {}, got {}",
                MAX_BACKOFF_STEPS,
                config.backoff.steps
            );
        }
        let backoff = Backoff {
            duration: Duration::from_millis(config.backoff.duration_ms),
            factor: config.backoff.factor,
            steps: config.backoff.steps,
        };

        let prom_exporter: Option<SocketAddr> = match config.prom_exporter {
            Some(addr) => Some(
                addr.parse()
                    .with_context(|| format!("Failed to parse into Socket address: {}", addr))?,
            ),
            None => None,
        };

        let leader_election = if config.leader_election.enabled {
            Some(lease_settings(config.leader_election)?)
        } else {
            None
        };

        Ok(ServiceConfiguration {
            hcloud_token,
            hcloud_endpoint: config
                .hcloud_endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            address_kind,
            floating_ips: config.floating_ips,
            reconcile_interval: Duration::from_secs(interval_seconds),
            backoff,
            leader_election,
            log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
            prom_exporter,
        })
    }
}

fn lease_settings(node: LeaderElectionNode) -> Result<LeaseSettings> {
    let identity = node.identity.unwrap_or_default();
    if identity.trim().is_empty() {
        bail!("leader_election.identity is required, set it or POD_NAME");
    }
    if node.lease_name.is_empty() || node.namespace.is_empty() {
        bail!("leader_election.lease_name and leader_election.namespace must not be empty");
    }

    let (lease, renew, retry) = (
        node.lease_duration_seconds,
        node.renew_deadline_seconds,
        node.retry_period_seconds,
    );
    if retry == 0 || renew <= retry || lease <= renew {
        bail!(
            "leader election needs lease_duration ({}s) > renew_deadline ({}s) > retry_period ({}s) > 0",
            lease,
            renew,
            retry
        );
    }

    Ok(LeaseSettings {
        lease_name: node.lease_name,
        namespace: node.namespace,
        election: LeaderElectionConfig {
            identity,
            lease_duration: Duration::from_secs(lease),
            renew_deadline: Duration::from_secs(renew),
            retry_period: Duration::from_secs(retry),
        },
    })
}

#[cfg(test)]
#[path = "service_configuration_test.rs"]
mod tests;
