mod args_parse;

use std::sync::Arc;

use crate::args_parse::Args;
use anyhow::{Context, Result};
use clap::Parser;
use floatip_controller::{
    controller_metrics::init_metrics, ControlLoop, LeaderElection, LoadConfiguration, Reconciler,
    ServiceConfiguration,
};
use floatip_hcloud::HcloudClient;
use floatip_kube::{KubeCluster, KubeLeaseLock};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load the configuration from the specified YAML file, then apply the overrides
    let mut load_config = LoadConfiguration::from_file(&args.config_file)?;
    args.apply(&mut load_config);
    let service_config: ServiceConfiguration = load_config.try_into()?;

    // Initialize logging, RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&service_config.log_level)),
        )
        .init();
    info!(config = ?service_config, "configuration loaded");

    let identity = service_config
        .leader_election
        .as_ref()
        .map(|lease| lease.election.identity.clone())
        .unwrap_or_else(|| "standalone".to_string());
    init_metrics(service_config.prom_exporter, &identity)?;

    // Build the API clients, failing here is fatal
    let cloud = HcloudClient::new(&service_config.hcloud_token, &service_config.hcloud_endpoint)
        .context("Failed to create the Hetzner Cloud client")?;
    let kube_client = floatip_kube::default_client()
        .await
        .context("Failed to create the Kubernetes client")?;

    let reconciler = Reconciler::new(
        Arc::new(cloud),
        Arc::new(KubeCluster::new(kube_client.clone())),
        service_config.reconcile_settings(),
    );
    let control_loop = ControlLoop::new(reconciler, service_config.reconcile_interval);

    let shutdown = CancellationToken::new();
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install the SIGTERM handler")?;
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
                _ = terminate.recv() => info!("received SIGTERM, shutting down"),
            }
            shutdown.cancel();
        }
    });

    match service_config.leader_election {
        Some(lease) => {
            info!(
                lease = %lease.lease_name,
                namespace = %lease.namespace,
                identity = %lease.election.identity,
                "starting leader election"
            );
            let lock = KubeLeaseLock::new(kube_client, &lease.namespace, &lease.lease_name);
            LeaderElection::new(Arc::new(lock), lease.election)
                .run(control_loop, shutdown)
                .await;
        }
        None => {
            info!("leader election disabled, reconciling unconditionally");
            control_loop.run(shutdown).await;
        }
    }

    info!("floatip controller stopped");
    Ok(())
}
