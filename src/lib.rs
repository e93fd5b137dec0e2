//! Waits for an IPv4 network to become routable on the local host and
//! reports the first address bound to the interface owning it.

pub mod config;
pub mod discover;
pub mod error;
pub mod routes;

pub use discover::Resolver;
pub use error::{DiscoverError, DiscoverResult, Fault};
pub use routes::{Address, Link, Route, RouteSubscription, RouteUpdate, RouteUpdateKind, RoutingBackend, TableId};

#[cfg(target_os = "linux")]
pub use routes::netlink::NetlinkBackend;
