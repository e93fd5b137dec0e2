// Route watcher - blocks until a new route makes the network reachable

use ipnetwork::Ipv4Network;
use tokio_util::sync::CancellationToken;

use crate::error::{DiscoverError, DiscoverResult, Fault};
use crate::routes::lookup::RouteMatcher;
use crate::routes::{Link, RouteUpdateKind, RoutingBackend};

/// Wait for a route change that makes `matcher` find links for `network`.
///
/// Updates are consumed one at a time in delivery order and only new-route
/// events trigger a lookup. The subscription is dropped, and thereby
/// released, on every return path.
///
/// A route added after the caller's last lookup but before `subscribe` is
/// only noticed once a later new-route event arrives.
pub async fn wait_for_network_creation<B>(
    matcher: &RouteMatcher<'_, B>,
    backend: &B,
    network: &Ipv4Network,
    cancel: &CancellationToken,
) -> DiscoverResult<Vec<Link>>
where
    B: RoutingBackend + ?Sized,
{
    let mut subscription = backend.subscribe().await.map_err(|e| {
        tracing::error!("Failed to subscribe to route change events: {:#}", e);
        Fault::Subscribe(format!("{:#}", e))
    })?;

    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(%network, "Stopped waiting for network");
                return Err(DiscoverError::Cancelled);
            }
            update = subscription.next() => update,
        };

        let Some(update) = update else {
            tracing::error!("Route event stream closed");
            return Err(Fault::EventStreamClosed.into());
        };

        if update.kind != RouteUpdateKind::New {
            continue;
        }

        tracing::debug!(
            destination = ?update.route.destination,
            gateway = ?update.route.gateway,
            %network,
            "Route add event received"
        );

        if let Some(links) = matcher.find_links(network).await {
            tracing::info!("{} network was created", network);
            return Ok(links);
        }
    }
}
