// Route matcher - finds the links owning routes to a given network

use ipnetwork::Ipv4Network;

use super::{Link, Route, RoutingBackend, TableId};

pub struct RouteMatcher<'a, B: ?Sized> {
    backend: &'a B,
    tables: &'a [TableId],
}

impl<'a, B: RoutingBackend + ?Sized> RouteMatcher<'a, B> {
    pub fn new(backend: &'a B, tables: &'a [TableId]) -> Self {
        RouteMatcher { backend, tables }
    }

    /// Links owning a route to `network`, in table order.
    ///
    /// Returns `None` when nothing matched. Failing tables and links that
    /// cannot be resolved are skipped.
    pub async fn find_links(&self, network: &Ipv4Network) -> Option<Vec<Link>> {
        tracing::debug!(%network, "Finding local routes");

        let routes = self.collect_routes().await;
        tracing::debug!(?routes, "Routes found");

        let mut links = Vec::new();
        for route in routes.iter().filter(|route| matches_destination(route, network)) {
            tracing::debug!(?route, "Route matched");

            let Some(index) = route.link_index else {
                tracing::debug!(?route, "Matched route has no output link");
                continue;
            };

            match self.backend.link_by_index(index).await {
                Ok(link) => links.push(link),
                Err(e) => tracing::warn!("Failed to resolve link {}: {:#}", index, e),
            }
        }

        if links.is_empty() { None } else { Some(links) }
    }

    async fn collect_routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();

        for &table in self.tables {
            match self.backend.routes(table).await {
                Ok(table_routes) => {
                    tracing::debug!("Adding {} routes from table {}", table_routes.len(), table);
                    routes.extend(table_routes);
                }
                Err(e) => tracing::warn!("Skipping routing table {}: {:#}", table, e),
            }
        }

        routes
    }
}

/// A route matches when its destination base address equals the network's.
/// Prefix lengths are not compared, so `10.0.0.0/16` matches `10.0.0.0/24`.
pub fn matches_destination(route: &Route, network: &Ipv4Network) -> bool {
    route
        .destination
        .is_some_and(|destination| destination.ip() == network.ip())
}
