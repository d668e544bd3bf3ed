use floatip_core::cluster::{AddressKind, ClusterApi};
use floatip_core::ResolutionError;
use tracing::debug;

/// Addresses of the ready cluster members, one per member, in listing order.
///
/// Members that are not ready or lack an address of `kind` are skipped; only an
/// empty result is an error.
pub(crate) async fn resolve_addresses(
    cluster: &dyn ClusterApi,
    kind: AddressKind,
) -> Result<Vec<String>, ResolutionError> {
    let members = cluster.list_members().await?;

    let mut addresses: Vec<String> = Vec::with_capacity(members.len());
    for member in members.iter().filter(|m| m.ready) {
        match member.address_of(kind) {
            Some(address) if !addresses.iter().any(|a| a == address) => {
                addresses.push(address.to_string())
            }
            Some(_) => {}
            None => debug!(member = %member.name, kind = %kind, "cluster member has no address of the configured kind"),
        }
    }

    if addresses.is_empty() {
        return Err(ResolutionError::NoAddresses(kind));
    }
    debug!(count = addresses.len(), kind = %kind, "resolved cluster member addresses");
    Ok(addresses)
}
