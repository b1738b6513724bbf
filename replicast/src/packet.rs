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

//! Module containing definitions for packets and the replica-state protocol
//! messages they carry.

use crate::types::{Address, LinkWeight, NodeId, ServiceId, SimTime};

/// A packet traveling through the simulated network. Packets are immutable
/// records; the only field rewritten in flight is the accumulated delay of a
/// [`ServerLoad`] payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Creation time at the origin node
    pub time: SimTime,
    /// Size in abstract size units (serialization and service time)
    pub size: u64,
    /// Sequence number at the origin node
    pub seq: usize,
    /// The originating node
    pub src: NodeId,
    /// The destination, either a node or a service
    pub dst: Address,
    /// Flow this packet belongs to
    pub flow_id: u32,
    /// The packet kind, with kind-specific fields
    pub kind: PacketKind,
}

/// The three packet kinds used by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketKind {
    /// Plain unicast data
    Data,
    /// A client request for a service; `size` is the requested service time
    ClientRequest,
    /// A hop-by-hop replica-state message
    ServerLoad(ServerLoad),
}

/// The two operations of the hop-by-hop replica-state protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOperation {
    /// Announce a replica, or update its metrics
    Announce,
    /// Withdraw a previously announced replica
    Withdraw,
}

/// A replica-state message. `src` and `dst` of the enclosing packet are the
/// hop-by-hop sender and receiver; the originating replica is carried here.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerLoad {
    /// The service name the replica provides
    pub service: ServiceId,
    /// The originating server
    pub replica: NodeId,
    /// Announce or Withdraw
    pub operation: LoadOperation,
    /// The announced metrics
    pub payload: LoadPayload,
}

/// The metrics carried by a replica-state message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadPayload {
    /// Load at the replica
    pub load: u32,
    /// Number of active flows at the replica
    pub no_of_flows: u32,
    /// Path delay, accumulated hop-by-hop. A replica announces 0.
    pub delay: LinkWeight,
    /// Available slots at the replica
    pub slots: u32,
}

/// Size of a replica-state packet: it carries three metric values.
pub(crate) const SERVER_LOAD_PACKET_SIZE: u64 = 3;
