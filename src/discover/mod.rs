// Discover module - resolves the first IPv4 address of a network once it is routable

pub mod address;
pub mod watcher;

use tokio_util::sync::CancellationToken;

use crate::error::DiscoverResult;
use crate::routes::lookup::RouteMatcher;
use crate::routes::{Address, RoutingBackend, TableId, parse_network};

pub struct Resolver<B> {
    backend: B,
    tables: Vec<TableId>,
}

impl<B: RoutingBackend> Resolver<B> {
    pub fn new(backend: B) -> Self {
        Resolver {
            backend,
            tables: TableId::defaults(),
        }
    }

    /// Routing tables to examine, in order. An empty list keeps the defaults.
    pub fn with_tables(mut self, tables: Vec<TableId>) -> Self {
        if !tables.is_empty() {
            self.tables = tables;
        }
        self
    }

    pub fn tables(&self) -> &[TableId] {
        &self.tables
    }

    /// Wait until `network` is created and return its first IPv4 address.
    ///
    /// Blocks without a timeout while the network is missing. `Ok(None)` means
    /// the matched link has no IPv4 address.
    pub async fn resolve(&self, network: &str) -> DiscoverResult<Option<Address>> {
        self.resolve_with_cancel(network, &CancellationToken::new()).await
    }

    /// Same as [`Resolver::resolve`], but the wait ends with
    /// `DiscoverError::Cancelled` once `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        network: &str,
        cancel: &CancellationToken,
    ) -> DiscoverResult<Option<Address>> {
        tracing::info!("Getting first IP address from {} network", network);

        let network = parse_network(network).inspect_err(|e| {
            tracing::error!("Failed to parse network: {}", e);
        })?;

        let matcher = RouteMatcher::new(&self.backend, &self.tables);
        let links = match matcher.find_links(&network).await {
            Some(links) => links,
            None => {
                tracing::warn!("Waiting for creation of the network...");
                watcher::wait_for_network_creation(&matcher, &self.backend, &network, cancel).await?
            }
        };

        address::first_ipv4(&self.backend, &links).await
    }
}
