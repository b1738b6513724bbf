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

//! Module for defining events and the simulated-time event queue

use crate::link::LinkEnd;
use crate::packet::Packet;
use crate::server::Request;
use crate::types::{NodeId, ServiceId, SimTime};
use ordered_float::NotNan;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Event to handle
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A packet finished propagating over a link end and is delivered to the
    /// far node.
    Deliver {
        /// The link end the packet traveled over
        link: LinkEnd,
        /// The packet itself
        packet: Packet,
    },
    /// A switch port finished serializing its head packet and hands it to
    /// the attached link end.
    PortPull {
        /// The node owning the port
        node: NodeId,
        /// The far end of the port
        neighbour: NodeId,
    },
    /// An admitted request has been served and releases its slot.
    FlowComplete {
        /// The serving replica
        server: NodeId,
        /// The request being released
        request: Request,
    },
    /// A deferred load announcement fires at an integer tick.
    SendLoad {
        /// The announcing replica
        server: NodeId,
        /// The service to announce
        service: ServiceId,
    },
    /// A traffic source produces its next item.
    Arrival {
        /// Index of the source in the network's source list
        source: usize,
    },
    /// A scripted client request fires.
    SendRequest {
        /// The requesting client
        client: NodeId,
        /// The requested service
        service: ServiceId,
        /// The request size in service time units
        size: u64,
    },
    /// Background load at a replica changes.
    LoadChange {
        /// The affected replica
        server: NodeId,
        /// The service whose load changed
        service: ServiceId,
        /// New background load
        load: u32,
        /// New background flow count
        no_of_flows: u32,
    },
}

/// An event scheduled at a fixed simulated time. Ties are broken by
/// insertion order (FIFO), so ordering and equality only look at the time
/// and the insertion sequence number.
#[derive(Debug, Clone)]
struct Scheduled {
    time: NotNan<SimTime>,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Event queue for the discrete-event simulation. Events fire in time order;
/// events scheduled for the same simulated time fire in insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    now: SimTime,
    seq: u64,
}

impl EventQueue {
    /// Create an empty queue at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule an event at an absolute simulated time. Scheduling into the
    /// past is clamped to `now`.
    pub fn push_at(&mut self, time: SimTime, event: Event) {
        let time = if time < self.now { self.now } else { time };
        let time = NotNan::new(time).expect("event time must not be NaN");
        self.seq += 1;
        self.heap.push(Reverse(Scheduled { time, seq: self.seq, event }));
    }

    /// Schedule an event after a simulated delay.
    pub fn push_after(&mut self, delay: SimTime, event: Event) {
        self.push_at(self.now + delay, event);
    }

    /// Pop the next event, if it fires not later than `horizon`. Advances
    /// the simulated time to the fire time of the returned event.
    pub(crate) fn pop_until(&mut self, horizon: SimTime) -> Option<Event> {
        match self.heap.peek() {
            Some(Reverse(s)) if s.time.into_inner() <= horizon => {
                let Reverse(s) = self.heap.pop().unwrap();
                self.now = s.time.into_inner();
                Some(s.event)
            }
            _ => None,
        }
    }

    /// Drop all remaining events and set the time to `horizon`. Called at
    /// the end of a run: callbacks never get cancelled individually, events
    /// beyond the horizon are simply discarded.
    pub(crate) fn drain(&mut self, horizon: SimTime) {
        self.heap.clear();
        if horizon > self.now {
            self.now = horizon;
        }
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
