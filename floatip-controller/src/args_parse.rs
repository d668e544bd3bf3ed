use clap::Parser;
use floatip_controller::service_configuration::LoadConfiguration;

#[derive(Debug, Parser)]
#[command(name = "floatip-controller")]
#[command(about = "Keeps floating IPs bound to ready Kubernetes nodes", long_about = None)]
#[command(version)]
pub(crate) struct Args {
    /// Path to config file
    #[arg(long, env = "FLOATIP_CONFIG_FILE", default_value = "config/floatip.yml")]
    pub(crate) config_file: String,

    /// Hetzner Cloud API token
    #[arg(long, env = "HCLOUD_TOKEN", hide_env_values = true)]
    pub(crate) hcloud_token: Option<String>,

    /// Identity used for leader election, normally the pod name
    #[arg(long, env = "POD_NAME")]
    pub(crate) pod_name: Option<String>,

    /// Namespace of the leader election lease
    #[arg(long, env = "NAMESPACE")]
    pub(crate) namespace: Option<String>,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long)]
    pub(crate) log_level: Option<String>,

    /// Prometheus Exporter http address
    #[arg(long)]
    pub(crate) prom_exporter: Option<String>,
}

impl Args {
    /// Apply the command-line overrides on top of the loaded file.
    ///
    /// The pod name only fills in the identity when the file does not set one.
    pub(crate) fn apply(self, config: &mut LoadConfiguration) {
        if let Some(token) = self.hcloud_token {
            config.hcloud_token = Some(token);
        }
        if let Some(pod_name) = self.pod_name {
            config.leader_election.identity.get_or_insert(pod_name);
        }
        if let Some(namespace) = self.namespace {
            config.leader_election.namespace = namespace;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = Some(log_level);
        }
        if let Some(prom_exporter) = self.prom_exporter {
            config.prom_exporter = Some(prom_exporter);
        }
    }
}
