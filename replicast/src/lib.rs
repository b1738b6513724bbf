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

#![deny(missing_docs)]

//! # Replicast
//!
//! This is a discrete-event network simulator for a service-anycast routing
//! protocol: routers learn, propagate, and select among multiple *replicas*
//! (servers offering the same logical service) so that client requests are
//! forwarded to the replica that currently minimizes a configurable utility
//! function of server load and path delay.
//!
//! Each router keeps a service RIB of candidate replicas, re-advertises the
//! Pareto-maximal entries to its neighbors (tracked in a sent table so
//! announcements and withdrawals are idempotent), and points a service
//! forwarding table at the neighbor leading to the best replica, with
//! damping against flapping. Announcements which do not arrive along the
//! reverse unicast shortest path towards their replica are dropped.
//!
//! ## Example usage
//!
//! The following example builds a chain of three routers with one replica of
//! the service `§a` and one client, lets the replica announce itself, and
//! checks that the farthest router points the service at the middle one.
//!
//! ```rust
//! use replicast::{Config, Network, ServiceId};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut net = Network::new(Config::default());
//!
//!     let a = net.add_router("a");
//!     let b = net.add_router("b");
//!     let c = net.add_router("c");
//!     let s1 = net.add_server("s1", ServiceId::new("§a"));
//!     let c1 = net.add_client("c1");
//!
//!     net.add_link(a, b, 1.0)?;
//!     net.add_link(b, c, 1.0)?;
//!     net.add_link(s1, a, 0.0)?;
//!     net.add_link(c1, c, 0.0)?;
//!
//!     net.announce_service(s1)?;
//!     net.run_until(10.0)?;
//!
//!     let rc = net.get_device(c).unwrap_router();
//!     assert_eq!(rc.service_next_hop(&ServiceId::new("§a")), Some(b));
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod event;
pub mod link;
pub mod network;
pub mod packet;
pub mod printer;
pub mod rib;
pub mod router;
pub mod server;
pub mod topology;
pub mod traffic;
pub mod types;

mod test;

pub use config::Config;
pub use network::Network;
pub use packet::{LoadOperation, LoadPayload, Packet, PacketKind, ServerLoad};
pub use types::{
    Address, DeviceError, LinkWeight, NetworkError, NodeId, NodeKind, ServiceId, SimTime,
};
