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

//! # Links and switch ports
//!
//! An undirected link is modeled as two opposing [`LinkEnd`]s. Each node
//! reaches a neighbor through a [`SwitchPort`], which serializes packets at a
//! configured rate and hands them to its link end, which in turn delivers
//! them after the propagation delay. Both stages are strict FIFO; there is no
//! loss and no reordering.
//!
//! Ownership is arena+index style: a port belongs to exactly one node and
//! records only the ids (and kind) of the two link endpoints, never object
//! references.

use crate::event::{Event, EventQueue};
use crate::packet::Packet;
use crate::types::{LinkWeight, NodeId, NodeKind};
use std::collections::VecDeque;
use std::fmt;

/// One directed end of a link. Carries one frame at a time with a fixed
/// propagation delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEnd {
    /// The transmitting node
    pub src: NodeId,
    /// The receiving node
    pub dst: NodeId,
    /// The kind of the receiving node
    pub dst_kind: NodeKind,
    /// Propagation delay in simulated seconds
    pub propagation_delay: LinkWeight,
}

impl LinkEnd {
    /// Start propagating a packet. The packet is delivered to the far node
    /// after the propagation delay.
    pub(crate) fn transmit(&self, packet: Packet, queue: &mut EventQueue) {
        queue.push_after(self.propagation_delay, Event::Deliver { link: *self, packet });
    }
}

impl fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinkEnd {} --> {} ({})",
            self.src.index(),
            self.dst.index(),
            self.propagation_delay
        )
    }
}

/// A per-neighbor transmit queue. Models the serialization delay
/// `size / rate` before a packet enters the link; a non-finite rate disables
/// the delay. Byte- or packet-count limits are not modeled.
#[derive(Debug, Clone)]
pub struct SwitchPort {
    link: LinkEnd,
    rate: f64,
    queue: VecDeque<Packet>,
    busy: bool,
}

impl SwitchPort {
    /// Create a new port feeding the given link end.
    pub(crate) fn new(link: LinkEnd, rate: f64) -> Self {
        Self { link, rate, queue: VecDeque::new(), busy: false }
    }

    /// The far end of this port.
    pub fn neighbour(&self) -> NodeId {
        self.link.dst
    }

    /// The kind of the node at the far end.
    pub fn far_kind(&self) -> NodeKind {
        self.link.dst_kind
    }

    /// The link end this port feeds.
    pub fn link(&self) -> LinkEnd {
        self.link
    }

    fn serialization_delay(&self, size: u64) -> f64 {
        if self.rate.is_finite() {
            size as f64 / self.rate
        } else {
            0.0
        }
    }

    /// Accept a packet for transmission. If the port is idle, serialization
    /// of this packet starts immediately.
    pub(crate) fn enqueue(&mut self, packet: Packet, queue: &mut EventQueue) {
        let delay = self.serialization_delay(packet.size);
        self.queue.push_back(packet);
        if !self.busy {
            self.busy = true;
            queue.push_after(
                delay,
                Event::PortPull { node: self.link.src, neighbour: self.link.dst },
            );
        }
    }

    /// Serialization of the head packet finished: hand it to the link end
    /// and re-arm for the next packet, if any.
    pub(crate) fn pull(&mut self, queue: &mut EventQueue) {
        if let Some(packet) = self.queue.pop_front() {
            self.link.transmit(packet, queue);
        }
        match self.queue.front() {
            Some(next) => {
                let delay = self.serialization_delay(next.size);
                queue.push_after(
                    delay,
                    Event::PortPull { node: self.link.src, neighbour: self.link.dst },
                );
            }
            None => self.busy = false,
        }
    }
}
