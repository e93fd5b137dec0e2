// Routes module - routing table model and the OS backend seam

pub mod lookup;
#[cfg(target_os = "linux")]
pub mod netlink;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{DiscoverError, DiscoverResult};

/// An IPv4 address together with the prefix length of its network.
pub type Address = Ipv4Network;

/// Parse an IPv4 network in `a.b.c.d/len` notation.
///
/// Host bits are cleared, so `10.0.0.5/24` yields `10.0.0.0/24`. A bare
/// address without a prefix length is rejected, and the prefix length must
/// be one or two plain digits with no sign or padding.
pub fn parse_network(network: &str) -> DiscoverResult<Ipv4Network> {
    let invalid = || DiscoverError::InvalidNetwork(network.to_string());

    let (addr, prefix_len) = network.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    if !is_prefix_len_literal(prefix_len) {
        return Err(invalid());
    }
    let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;
    let parsed = Ipv4Network::new(addr, prefix_len).map_err(|_| invalid())?;

    Ipv4Network::new(parsed.network(), prefix_len).map_err(|_| invalid())
}

fn is_prefix_len_literal(prefix_len: &str) -> bool {
    matches!(prefix_len.len(), 1 | 2) && prefix_len.bytes().all(|b| b.is_ascii_digit())
}

/// Identifier of a kernel routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableId(pub u32);

impl TableId {
    pub const DEFAULT: TableId = TableId(253);
    pub const MAIN: TableId = TableId(254);
    pub const LOCAL: TableId = TableId(255);

    /// Tables examined when none are configured: local routes first, then main
    pub fn defaults() -> Vec<TableId> {
        vec![TableId::LOCAL, TableId::MAIN]
    }
}

impl FromStr for TableId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(TableId::LOCAL),
            "main" => Ok(TableId::MAIN),
            "default" => Ok(TableId::DEFAULT),
            other => other
                .parse()
                .map(TableId)
                .map_err(|_| format!("Invalid routing table: {}", s)),
        }
    }
}

impl TryFrom<String> for TableId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableId> for String {
    fn from(table: TableId) -> Self {
        table.to_string()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TableId::LOCAL => write!(f, "local"),
            TableId::MAIN => write!(f, "main"),
            TableId::DEFAULT => write!(f, "default"),
            TableId(id) => write!(f, "{}", id),
        }
    }
}

/// Snapshot of one IPv4 routing table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub table: TableId,
    /// `None` for the default route
    pub destination: Option<Ipv4Network>,
    pub gateway: Option<Ipv4Addr>,
    pub link_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.name, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteUpdateKind {
    New,
    Delete,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUpdate {
    pub kind: RouteUpdateKind,
    pub route: Route,
}

/// Live stream of route change notifications.
///
/// The release action runs exactly once, when the subscription is dropped.
pub struct RouteSubscription {
    updates: BoxStream<'static, RouteUpdate>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RouteSubscription {
    pub fn new(updates: BoxStream<'static, RouteUpdate>) -> Self {
        RouteSubscription {
            updates,
            release: None,
        }
    }

    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Next update in delivery order, `None` once the stream has closed
    pub async fn next(&mut self) -> Option<RouteUpdate> {
        self.updates.next().await
    }
}

impl Drop for RouteSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Read-only access to the host routing state
#[async_trait]
pub trait RoutingBackend: Send + Sync {
    /// IPv4 routes of a single routing table
    async fn routes(&self, table: TableId) -> anyhow::Result<Vec<Route>>;

    async fn link_by_index(&self, index: u32) -> anyhow::Result<Link>;

    /// IPv4 addresses bound to `link`, in kernel table order
    async fn ipv4_addresses(&self, link: &Link) -> anyhow::Result<Vec<Address>>;

    async fn subscribe(&self) -> anyhow::Result<RouteSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_network() {
        let network = parse_network("192.168.1.0/24").unwrap();
        assert_eq!(network.ip(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(network.prefix(), 24);
    }

    #[test]
    fn test_parse_network_prefix_bounds() {
        assert_eq!(parse_network("0.0.0.0/0").unwrap().prefix(), 0);
        assert_eq!(parse_network("10.0.0.1/32").unwrap().prefix(), 32);
        assert_eq!(parse_network("10.0.0.0/8").unwrap().prefix(), 8);
    }

    #[test]
    fn test_parse_network_clears_host_bits() {
        let network = parse_network("10.0.0.5/24").unwrap();
        assert_eq!(network.ip(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(network.prefix(), 24);
    }

    #[test]
    fn test_parse_network_rejects_malformed() {
        for input in [
            "",
            "10.0.0.0",
            "10.0.0.0/33",
            "10.0/8",
            "10.0.0.256/24",
            "fd00::/64",
            "10.0.0.0/abc",
            "not-a-network",
            "10.0.0.0/+24",
            "10.0.0.0/-0",
            " 10.0.0.0/24\n",
            "10.0.0.0/24 ",
            "10.0.0.0/024",
            "10.0.0.0/",
            "10.0.0.0/100",
        ] {
            assert!(
                matches!(parse_network(input), Err(DiscoverError::InvalidNetwork(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_table_id_parse_and_display() {
        assert_eq!("local".parse::<TableId>().unwrap(), TableId::LOCAL);
        assert_eq!("Main".parse::<TableId>().unwrap(), TableId::MAIN);
        assert_eq!("100".parse::<TableId>().unwrap(), TableId(100));
        assert!("bogus".parse::<TableId>().is_err());

        assert_eq!(TableId::LOCAL.to_string(), "local");
        assert_eq!(TableId(100).to_string(), "100");
        assert_eq!(TableId::defaults(), vec![TableId::LOCAL, TableId::MAIN]);
    }

    #[test]
    fn test_subscription_releases_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();

        let subscription = RouteSubscription::new(futures::stream::empty().boxed())
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        drop(subscription);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
