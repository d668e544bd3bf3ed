use floatip_core::cloud::{CloudProvider, Server};
use floatip_core::MatchError;
use tracing::debug;

/// Servers backing a live cluster member, i.e. reachable on one of `addresses`.
pub(crate) async fn running_servers(
    cloud: &dyn CloudProvider,
    addresses: &[String],
) -> Result<Vec<Server>, MatchError> {
    let running: Vec<Server> = cloud
        .list_servers()
        .await?
        .into_iter()
        .filter(|s| addresses.iter().any(|a| s.has_address(a)))
        .collect();

    if running.is_empty() {
        return Err(MatchError::NoRunningServers {
            addresses: addresses.len(),
        });
    }
    debug!(count = running.len(), "matched running servers");
    Ok(running)
}
