use floatip_core::cloud::{CloudProvider, FloatingIp};
use floatip_core::SourceError;
use tracing::debug;

/// The floating IPs to manage this pass.
///
/// With a configured list, exactly those addresses are returned in configured
/// order and each one must exist in the project. IPv6 entries may name the
/// network, its base address or a host inside it. Without one, every floating IP
/// of the project is managed; an empty project is a valid no-op, unlike a failed
/// listing.
pub(crate) async fn managed_floating_ips(
    cloud: &dyn CloudProvider,
    configured: &[String],
) -> Result<Vec<FloatingIp>, SourceError> {
    let all = cloud.list_floating_ips().await?;

    if configured.is_empty() {
        if all.is_empty() {
            debug!("project has no floating IPs, nothing to manage");
        }
        return Ok(all);
    }

    configured
        .iter()
        .map(|address| {
            all.iter()
                .find(|f| f.matches_address(address))
                .cloned()
                .ok_or_else(|| SourceError::NotFound(address.clone()))
        })
        .collect()
}
