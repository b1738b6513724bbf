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

//! # Client
//!
//! A client originates requests for a service name and consumes whatever is
//! addressed to it. Clients never take part in the replica-state protocol.

use crate::event::EventQueue;
use crate::link::{LinkEnd, SwitchPort};
use crate::packet::{Packet, PacketKind};
use crate::types::{Address, DeviceError, NodeId, ServiceId};
use log::*;

/// A client host.
#[derive(Debug, Clone)]
pub struct Client {
    name: String,
    node_id: NodeId,
    /// The single upstream port; a client has degree 1
    port: Option<SwitchPort>,
    /// Sequence number for outgoing requests
    pkt_no: usize,
}

impl Client {
    pub(crate) fn new(name: String, node_id: NodeId) -> Self {
        Self { name, node_id, port: None, pkt_no: 1 }
    }

    /// Return the id of the client.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Return the name of the client.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Number of requests sent so far.
    pub fn requests_sent(&self) -> usize {
        self.pkt_no - 1
    }

    /// The upstream neighbor, once attached.
    pub fn neighbour(&self) -> Option<NodeId> {
        self.port.as_ref().map(|p| p.neighbour())
    }

    pub(crate) fn attach(&mut self, port: SwitchPort) -> Result<(), DeviceError> {
        match self.port {
            Some(_) => Err(DeviceError::NoPortTo(port.neighbour())),
            None => {
                self.port = Some(port);
                Ok(())
            }
        }
    }

    pub(crate) fn has_port(&self) -> bool {
        self.port.is_some()
    }

    pub(crate) fn port_pull(&mut self, queue: &mut EventQueue) -> Result<(), DeviceError> {
        self.port
            .as_mut()
            .ok_or(DeviceError::HostNotAttached(self.node_id))?
            .pull(queue);
        Ok(())
    }

    /// Consume a delivered packet. Clients never forward.
    pub(crate) fn handle_packet(
        &mut self,
        link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        if packet.dst == Address::Node(self.node_id) {
            info!(
                "{:.3}: HOST Packet {}.{} consumed in '{}' from {} after {:.3}",
                queue.now(),
                packet.src.index(),
                packet.seq,
                self.name,
                link.src.index(),
                queue.now() - packet.time
            );
        } else {
            warn!(
                "{:.3}: HOST Packet {}.{} not for '{}', dropped",
                queue.now(),
                packet.src.index(),
                packet.seq,
                self.name
            );
        }
        Ok(())
    }

    /// Originate a request for a service and enqueue it upstream.
    pub(crate) fn send_request(
        &mut self,
        service: ServiceId,
        size: u64,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let port = self
            .port
            .as_mut()
            .ok_or(DeviceError::HostNotAttached(self.node_id))?;
        let packet = Packet {
            time: queue.now(),
            size,
            seq: self.pkt_no,
            src: self.node_id,
            dst: Address::Service(service),
            flow_id: 0,
            kind: PacketKind::ClientRequest,
        };
        info!(
            "{:.3}: SEND_REQUEST '{}' pkt: {} for service {} size {}",
            queue.now(),
            self.name,
            packet.seq,
            packet.dst.service().unwrap(),
            size
        );
        self.pkt_no += 1;
        port.enqueue(packet, queue);
        Ok(())
    }
}
