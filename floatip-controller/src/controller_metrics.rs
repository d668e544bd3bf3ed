use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

pub(crate) struct Metric {
    pub name: &'static str,
    description: &'static str,
}

pub(crate) const COUNTERS: [Metric; 4] = [
    RECONCILE_PASSES_TOTAL,
    RECONCILE_FAILURES_TOTAL,
    ASSIGNMENTS_TOTAL,
    ASSIGNMENT_FAILURES_TOTAL,
];
pub(crate) const GAUGES: [Metric; 2] = [LEADER_ELECTION_STATE, RUNNING_SERVERS];
pub(crate) const HISTOGRAMS: [Metric; 1] = [RECONCILE_DURATION_SECONDS];

// RECONCILER Metrics ----------------------

pub(crate) const RECONCILE_PASSES_TOTAL: Metric = Metric {
    name: "floatip_reconcile_passes_total",
    description: "Total number of reconciliation passes started",
};

pub(crate) const RECONCILE_FAILURES_TOTAL: Metric = Metric {
    name: "floatip_reconcile_failures_total",
    description: "Total number of reconciliation passes that ended with an error",
};

pub(crate) const ASSIGNMENTS_TOTAL: Metric = Metric {
    name: "floatip_assignments_total",
    description: "Total number of floating IP assignments applied",
};

pub(crate) const ASSIGNMENT_FAILURES_TOTAL: Metric = Metric {
    name: "floatip_assignment_failures_total",
    description: "Total number of floating IP assignments given up after retries",
};

pub(crate) const RUNNING_SERVERS: Metric = Metric {
    name: "floatip_running_servers",
    description: "Servers matched to ready cluster members in the last pass",
};

pub(crate) const RECONCILE_DURATION_SECONDS: Metric = Metric {
    name: "floatip_reconcile_duration_seconds",
    description: "Duration of a reconciliation pass in seconds",
};

// LEADER ELECTION Metrics -----------------

pub(crate) const LEADER_ELECTION_STATE: Metric = Metric {
    name: "floatip_leader_election_state",
    description: "Leader election state of this replica (0=following,1=leading)",
};

/// Describe every metric and, when an address is given, serve them for Prometheus.
pub fn init_metrics(prom_addr: Option<std::net::SocketAddr>, identity: &str) -> Result<()> {
    info!("initializing metrics exporter");

    if let Some(addr) = prom_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("replica", identity)
            .install()
            .context("failed to install Prometheus recorder")?;
        info!(addr = %addr, "prometheus exporter listening");
    }

    for metric in COUNTERS {
        metrics::describe_counter!(metric.name, metric.description);
    }

    for metric in GAUGES {
        metrics::describe_gauge!(metric.name, metric.description);
    }

    for metric in HISTOGRAMS {
        metrics::describe_histogram!(metric.name, metric.description);
    }

    Ok(())
}
