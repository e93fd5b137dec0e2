// Address resolver - first IPv4 address of the first matched link

use crate::error::{DiscoverResult, Fault};
use crate::routes::{Address, Link, RoutingBackend};

/// First IPv4 address bound to the first link of `links`.
///
/// Later links are never consulted. A link without addresses yields `None`,
/// while a failed address query is unrecoverable.
pub async fn first_ipv4<B>(backend: &B, links: &[Link]) -> DiscoverResult<Option<Address>>
where
    B: RoutingBackend + ?Sized,
{
    let Some(link) = links.first() else {
        return Ok(None);
    };

    tracing::debug!(?links, "Getting first IP address");

    let addresses = backend.ipv4_addresses(link).await.map_err(|e| {
        tracing::error!("Error getting the IPv4 addresses of {}: {:#}", link, e);
        Fault::AddressQuery {
            link: link.name.clone(),
            reason: format!("{:#}", e),
        }
    })?;

    tracing::debug!(?addresses, device = %link.name, "IP addresses retrieved");

    Ok(addresses.first().copied())
}
