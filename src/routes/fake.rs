// In-memory routing backend for unit tests

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Address, Link, Route, RouteSubscription, RouteUpdate, RouteUpdateKind, RoutingBackend, TableId};

pub(crate) fn route(table: TableId, destination: &str, link_index: u32) -> Route {
    Route {
        table,
        destination: Some(destination.parse().unwrap()),
        gateway: None,
        link_index: Some(link_index),
    }
}

#[derive(Default)]
struct FakeState {
    tables: HashMap<TableId, Vec<Route>>,
    failing_tables: HashSet<TableId>,
    links: HashMap<u32, Link>,
    addresses: HashMap<u32, Vec<Address>>,
    failing_addresses: bool,
    failing_subscribe: bool,
    route_queries: usize,
    subscriptions: usize,
    releases: usize,
    events_tx: Option<UnboundedSender<RouteUpdate>>,
    events_rx: Option<UnboundedReceiver<RouteUpdate>>,
}

impl FakeState {
    /// The kernel updates its tables before notifying subscribers
    fn apply(&mut self, update: &RouteUpdate) {
        let routes = self.tables.entry(update.route.table).or_default();
        match update.kind {
            RouteUpdateKind::New => routes.push(update.route.clone()),
            RouteUpdateKind::Delete => routes.retain(|r| *r != update.route),
            RouteUpdateKind::Other => {}
        }
    }
}

/// Cloning shares the underlying state
#[derive(Clone)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        let state = FakeState {
            events_tx: Some(tx),
            events_rx: Some(rx),
            ..Default::default()
        };
        FakeBackend {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut *self.state.lock().unwrap());
        self
    }

    pub(crate) fn with_link(self, index: u32, name: &str) -> Self {
        let link = Link {
            index,
            name: name.to_string(),
        };
        self.with_state(|s| {
            s.links.insert(index, link);
        })
    }

    pub(crate) fn with_route(self, table: TableId, destination: &str, link_index: u32) -> Self {
        let route = route(table, destination, link_index);
        self.with_state(|s| s.tables.entry(table).or_default().push(route))
    }

    pub(crate) fn with_address(self, link_index: u32, address: &str) -> Self {
        let address: Address = address.parse().unwrap();
        self.with_state(|s| s.addresses.entry(link_index).or_default().push(address))
    }

    pub(crate) fn with_failing_table(self, table: TableId) -> Self {
        self.with_state(|s| {
            s.failing_tables.insert(table);
        })
    }

    pub(crate) fn with_failing_addresses(self) -> Self {
        self.with_state(|s| s.failing_addresses = true)
    }

    pub(crate) fn with_failing_subscribe(self) -> Self {
        self.with_state(|s| s.failing_subscribe = true)
    }

    /// Queue a route change notification
    pub(crate) fn emit(&self, kind: RouteUpdateKind, route: Route) {
        let state = self.state.lock().unwrap();
        if let Some(tx) = &state.events_tx {
            tx.send(RouteUpdate { kind, route }).unwrap();
        }
    }

    /// Close the event stream once queued notifications are consumed
    pub(crate) fn close_events(&self) {
        self.state.lock().unwrap().events_tx = None;
    }

    pub(crate) fn route_queries(&self) -> usize {
        self.state.lock().unwrap().route_queries
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions
    }

    pub(crate) fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }
}

#[async_trait]
impl RoutingBackend for FakeBackend {
    async fn routes(&self, table: TableId) -> anyhow::Result<Vec<Route>> {
        let mut state = self.state.lock().unwrap();
        state.route_queries += 1;
        if state.failing_tables.contains(&table) {
            bail!("table {} unavailable", table);
        }
        Ok(state.tables.get(&table).cloned().unwrap_or_default())
    }

    async fn link_by_index(&self, index: u32) -> anyhow::Result<Link> {
        let state = self.state.lock().unwrap();
        state
            .links
            .get(&index)
            .cloned()
            .ok_or_else(|| anyhow!("no link with index {}", index))
    }

    async fn ipv4_addresses(&self, link: &Link) -> anyhow::Result<Vec<Address>> {
        let state = self.state.lock().unwrap();
        if state.failing_addresses {
            bail!("address dump of {} failed", link.name);
        }
        Ok(state.addresses.get(&link.index).cloned().unwrap_or_default())
    }

    async fn subscribe(&self) -> anyhow::Result<RouteSubscription> {
        let mut state = self.state.lock().unwrap();
        if state.failing_subscribe {
            bail!("permission denied");
        }
        let rx = state.events_rx.take().ok_or_else(|| anyhow!("already subscribed"))?;
        state.subscriptions += 1;

        let applied = self.state.clone();
        let updates = UnboundedReceiverStream::new(rx)
            .inspect(move |update| applied.lock().unwrap().apply(update))
            .boxed();

        let released = self.state.clone();
        Ok(RouteSubscription::new(updates).on_release(move || {
            released.lock().unwrap().releases += 1;
        }))
    }
}
