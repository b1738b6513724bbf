// Replicast: Simulating Service-Anycast Routing
// Copyright (C) 2022  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all type definitions

use crate::client::Client;
use crate::router::Router;
use crate::server::Server;
use crate::topology::gml_parser::GmlError;
use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use std::fmt;
use thiserror::Error;

type IndexType = u32;
/// Node identification (and index into the physical graph)
pub type NodeId = NodeIndex<IndexType>;
/// Link weight, interpreted as the propagation delay of the link
pub type LinkWeight = f64;
/// Simulated time in (floating point) seconds
pub type SimTime = f64;
/// Physical network graph. Every undirected link is stored as two directed
/// edges, one for each link end.
pub type PhysNetwork = StableGraph<(), LinkWeight, Directed, IndexType>;

/// The sentinel character which marks a name as a service name in topology
/// input and log output.
pub const SERVICE_SENTINEL: char = '\u{a7}';

/// A logical service name, e.g. `§a`. The sentinel is not stored; it is
/// added back by the `Display` implementation and stripped by the
/// constructors.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a new service name. A leading sentinel character is stripped,
    /// so `ServiceId::new("§a")` and `ServiceId::new("a")` are the same
    /// service.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Self(name.strip_prefix(SERVICE_SENTINEL).unwrap_or(name).to_string())
    }

    /// The bare service name, without the sentinel.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the given name carries the service sentinel.
    pub fn is_service_name(name: &str) -> bool {
        name.starts_with(SERVICE_SENTINEL)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SERVICE_SENTINEL, self.0)
    }
}

impl<'a> From<&'a str> for ServiceId {
    fn from(name: &'a str) -> Self {
        Self::new(name)
    }
}

/// Destination of a packet: either a concrete node, or a logical service
/// which is resolved hop-by-hop by the service forwarding tables.
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub enum Address {
    /// A concrete node in the topology
    Node(NodeId),
    /// A logical service name
    Service(ServiceId),
}

impl Address {
    /// Returns true if the address is a service name.
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Returns the node id, if the address is a node.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(n) => Some(*n),
            Self::Service(_) => None,
        }
    }

    /// Returns the service name, if the address is a service.
    pub fn service(&self) -> Option<&ServiceId> {
        match self {
            Self::Node(_) => None,
            Self::Service(s) => Some(s),
        }
    }
}

/// The kind of a node. Switch ports record the kind of their far end, so
/// that the forwarding rules can avoid trapping transit traffic in hosts.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeKind {
    /// A transit router
    Router,
    /// A server host (replica)
    Server,
    /// A client host
    Client,
}

impl NodeKind {
    /// Returns true if the node is a transit router.
    pub fn is_router(&self) -> bool {
        matches!(self, Self::Router)
    }

    /// Returns true if the node is a host (server or client).
    pub fn is_host(&self) -> bool {
        !self.is_router()
    }
}

/// # Network Device (similar to `Option`)
/// Enumerates all possible network devices. This struct behaves similar to an
/// `Option`, but it knows three different `Some` values, one per node kind.
#[derive(Debug)]
pub enum NetworkDevice<'a> {
    /// A transit router
    Router(&'a Router),
    /// A server host
    Server(&'a Server),
    /// A client host
    Client(&'a Client),
    /// None was found
    None,
}

impl<'a> NetworkDevice<'a> {
    /// Returns the router or **panics**, if the device is not a router.
    pub fn unwrap_router(self) -> &'a Router {
        match self {
            Self::Router(r) => r,
            _ => panic!("`unwrap_router()` called on a device which is not a router"),
        }
    }

    /// Returns the server or **panics**, if the device is not a server.
    pub fn unwrap_server(self) -> &'a Server {
        match self {
            Self::Server(s) => s,
            _ => panic!("`unwrap_server()` called on a device which is not a server"),
        }
    }

    /// Returns the client or **panics**, if the device is not a client.
    pub fn unwrap_client(self) -> &'a Client {
        match self {
            Self::Client(c) => c,
            _ => panic!("`unwrap_client()` called on a device which is not a client"),
        }
    }

    /// Returns true if and only if self contains a router.
    pub fn is_router(&self) -> bool {
        matches!(self, Self::Router(_))
    }

    /// Returns true if and only if self contains `NetworkDevice::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the kind of the device, or `None` for a missing device.
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Self::Router(_) => Some(NodeKind::Router),
            Self::Server(_) => Some(NodeKind::Server),
            Self::Client(_) => Some(NodeKind::Client),
            Self::None => None,
        }
    }
}

/// Device Errors
#[derive(Error, Debug, PartialEq)]
pub enum DeviceError {
    /// Node was not found in the unicast forwarding table
    #[error("Node {0:?} is not known in the unicast forwarding table")]
    NodeNotFound(NodeId),
    /// Node is marked as not reachable in the unicast forwarding table
    #[error("Node {0:?} is not reachable in the topology")]
    NodeNotReachable(NodeId),
    /// There is no port towards the given neighbor
    #[error("No port towards neighbor {0:?}")]
    NoPortTo(NodeId),
    /// A host was asked to transmit before it was attached to a router
    #[error("Host {0:?} is not attached to any router")]
    HostNotAttached(NodeId),
}

/// Network Errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Device Error which cannot be handled
    #[error("Device Error: {0}")]
    DeviceError(#[from] DeviceError),
    /// Device is not present in the topology
    #[error("Network device was not found in topology: {0:?}")]
    DeviceNotFound(NodeId),
    /// Device name is not present in the topology
    #[error("Network device name was not found in topology: {0}")]
    DeviceNameNotFound(String),
    /// Device must be a server, but some other device was passed
    #[error("Network device is not a server: {0:?}")]
    DeviceNotServer(NodeId),
    /// Device must be a client, but some other device was passed
    #[error("Network device is not a client: {0:?}")]
    DeviceNotClient(NodeId),
    /// A host must be attached to exactly one router
    #[error("Host {0:?} must have exactly one link, but has {1}")]
    HostDegree(NodeId, usize),
    /// A link between the two nodes already exists
    #[error("Network link already exists: {0:?} <--> {1:?}")]
    LinkExists(NodeId, NodeId),
    /// A link must not connect two hosts directly
    #[error("Network link cannot connect two hosts: {0:?} <--> {1:?}")]
    LinkBetweenHosts(NodeId, NodeId),
    /// A traffic source was configured with an invalid rate
    #[error("Traffic source rate must be finite and positive: {0}")]
    InvalidRate(f64),
    /// Error while parsing a GML topology file
    #[error("GML error: {0}")]
    GmlError(#[from] GmlError),
}
