// Linux routing backend on top of rtnetlink

use anyhow::Context;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, future};
use ipnetwork::Ipv4Network;
use rtnetlink::RouteMessageBuilder;
use rtnetlink::constants::RTMGRP_IPV4_ROUTE;
use rtnetlink::packet_core::{NetlinkMessage, NetlinkPayload};
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::packet_route::link::LinkAttribute;
use rtnetlink::packet_route::route::{RouteAddress, RouteAttribute, RouteMessage};
use rtnetlink::packet_route::{AddressFamily, RouteNetlinkMessage};
use rtnetlink::sys::{AsyncSocket, SocketAddr};
use std::net::{IpAddr, Ipv4Addr};

use super::{Address, Link, Route, RouteSubscription, RouteUpdate, RouteUpdateKind, RoutingBackend, TableId};

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl From<tokio::task::AbortHandle> for AbortOnDrop {
    fn from(handle: tokio::task::AbortHandle) -> Self {
        AbortOnDrop(handle)
    }
}

/// Routing state of the running kernel, read over rtnetlink.
///
/// Must be created inside a tokio runtime; the connection task is aborted
/// when the backend is dropped.
pub struct NetlinkBackend {
    handle: rtnetlink::Handle,
    _connection: AbortOnDrop,
}

impl NetlinkBackend {
    pub fn connect() -> anyhow::Result<Self> {
        let (connection, handle, _) = rtnetlink::new_connection().context("failed to create netlink connection")?;
        let connection = AbortOnDrop::from(tokio::spawn(connection).abort_handle());
        Ok(NetlinkBackend {
            handle,
            _connection: connection,
        })
    }
}

#[async_trait]
impl RoutingBackend for NetlinkBackend {
    async fn routes(&self, table: TableId) -> anyhow::Result<Vec<Route>> {
        let mut messages = self
            .handle
            .route()
            .get(RouteMessageBuilder::<Ipv4Addr>::new().build())
            .execute();

        let mut routes = Vec::new();
        while let Some(message) = messages.try_next().await.context("route dump failed")? {
            match route_from_message(&message) {
                Some(route) if route.table == table => routes.push(route),
                _ => {}
            }
        }
        Ok(routes)
    }

    async fn link_by_index(&self, index: u32) -> anyhow::Result<Link> {
        let message = self
            .handle
            .link()
            .get()
            .match_index(index)
            .execute()
            .try_next()
            .await?
            .context("no matches for interface index")?;

        let name = message
            .attributes
            .into_iter()
            .find_map(|attr| if let LinkAttribute::IfName(name) = attr { Some(name) } else { None })
            .context("no name attribute for interface")?;

        Ok(Link { index, name })
    }

    async fn ipv4_addresses(&self, link: &Link) -> anyhow::Result<Vec<Address>> {
        let mut messages = self
            .handle
            .address()
            .get()
            .set_link_index_filter(link.index)
            .execute();

        let mut addresses = Vec::new();
        while let Some(message) = messages.try_next().await.context("address dump failed")? {
            if message.header.index != link.index {
                continue;
            }
            if let Some(address) = ipv4_address(&message) {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    async fn subscribe(&self) -> anyhow::Result<RouteSubscription> {
        let (mut connection, handle, messages) =
            rtnetlink::new_connection().context("failed to create netlink connection")?;
        connection
            .socket_mut()
            .socket_mut()
            .bind(&SocketAddr::new(0, RTMGRP_IPV4_ROUTE))
            .context("netlink socket bind failed")?;
        connection.forward_unsolicited_messages();
        let connection = AbortOnDrop::from(tokio::spawn(connection).abort_handle());

        let updates = messages
            .filter_map(|(message, _)| future::ready(route_update(message)))
            .boxed();

        // the connection task stops once every handle is gone, keep ours until release
        Ok(RouteSubscription::new(updates).on_release(move || {
            drop(handle);
            drop(connection);
        }))
    }
}

fn route_from_message(message: &RouteMessage) -> Option<Route> {
    if message.header.address_family != AddressFamily::Inet {
        return None;
    }

    let mut table = TableId(u32::from(message.header.table));
    let (mut destination, mut gateway, mut link_index) = (None, None, None);
    for attr in &message.attributes {
        match attr {
            RouteAttribute::Table(id) => table = TableId(*id),
            RouteAttribute::Destination(RouteAddress::Inet(ip)) => destination = Some(*ip),
            RouteAttribute::Gateway(RouteAddress::Inet(ip)) => gateway = Some(*ip),
            RouteAttribute::Oif(index) => link_index = Some(*index),
            _ => {}
        }
    }

    let destination = match destination {
        Some(ip) => Some(Ipv4Network::new(ip, message.header.destination_prefix_length).ok()?),
        None => None,
    };

    Some(Route {
        table,
        destination,
        gateway,
        link_index,
    })
}

fn route_update(message: NetlinkMessage<RouteNetlinkMessage>) -> Option<RouteUpdate> {
    let NetlinkPayload::InnerMessage(message) = message.payload else {
        return None;
    };

    let (kind, route) = match message {
        RouteNetlinkMessage::NewRoute(route) => (RouteUpdateKind::New, route),
        RouteNetlinkMessage::DelRoute(route) => (RouteUpdateKind::Delete, route),
        RouteNetlinkMessage::GetRoute(route) => (RouteUpdateKind::Other, route),
        _ => return None,
    };

    Some(RouteUpdate {
        kind,
        route: route_from_message(&route)?,
    })
}

/// IFA_LOCAL wins over IFA_ADDRESS, which holds the peer on point-to-point links
fn ipv4_address(message: &AddressMessage) -> Option<Address> {
    if message.header.family != AddressFamily::Inet {
        return None;
    }

    let (mut local, mut address) = (None, None);
    for attr in &message.attributes {
        match attr {
            AddressAttribute::Local(IpAddr::V4(ip)) => local = Some(*ip),
            AddressAttribute::Address(IpAddr::V4(ip)) => address = Some(*ip),
            _ => {}
        }
    }

    Ipv4Network::new(local.or(address)?, message.header.prefix_len).ok()
}
