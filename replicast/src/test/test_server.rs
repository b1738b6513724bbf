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

use crate::config::Config;
use crate::event::{Event, EventQueue};
use crate::link::{LinkEnd, SwitchPort};
use crate::packet::{Packet, PacketKind};
use crate::server::Server;
use crate::types::{Address, NodeKind, ServiceId};

/// The server under test has id 10 and hangs off router 0.
fn server(slots: u32) -> Server {
    let mut s = Server::new("s1".to_string(), 10.into(), ServiceId::new("a"), slots);
    s.attach(SwitchPort::new(
        LinkEnd {
            src: 10.into(),
            dst: 0.into(),
            dst_kind: NodeKind::Router,
            propagation_delay: 1.0,
        },
        f64::INFINITY,
    ))
    .unwrap();
    s
}

fn request(seq: usize, size: u64) -> (LinkEnd, Packet) {
    let link = LinkEnd {
        src: 0.into(),
        dst: 10.into(),
        dst_kind: NodeKind::Server,
        propagation_delay: 1.0,
    };
    let packet = Packet {
        time: 0.0,
        size,
        seq,
        src: 20.into(),
        dst: Address::Service(ServiceId::new("a")),
        flow_id: 0,
        kind: PacketKind::ClientRequest,
    };
    (link, packet)
}

/// Process pending events up to the horizon: releases fire on the server,
/// port transmissions complete.
fn step(s: &mut Server, q: &mut EventQueue, config: &Config, horizon: f64) {
    while let Some(event) = q.pop_until(horizon) {
        match event {
            Event::FlowComplete { request, .. } => {
                s.decrease_load(request, q, config).unwrap()
            }
            Event::SendLoad { service, .. } => s.process_send_load(service, q).unwrap(),
            Event::PortPull { .. } => s.port_pull(q).unwrap(),
            _ => {}
        }
    }
}

#[test]
fn test_admission_rejection() {
    // two slots, three concurrent requests
    let mut s = server(2);
    let mut q = EventQueue::new();
    let config = Config::default();

    let (l, p) = request(1, 5);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(s.calculate_flows(), 1);
    assert_eq!(s.packets_sent(), 1);

    let (l, p) = request(2, 8);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(s.calculate_flows(), 2);
    assert_eq!(s.calculate_slots(), 0);
    // same tick: the change is not announced a second time
    assert_eq!(s.packets_sent(), 1);

    // the third request finds no free slot and is not counted
    let (l, p) = request(3, 5);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(s.calculate_flows(), 2);
    assert_eq!(s.calculate_load(), 2);
    assert_eq!(s.packets_sent(), 1);

    // release of the first request restores one slot
    step(&mut s, &mut q, &config, 5.0);
    assert_eq!(s.calculate_flows(), 1);
    assert_eq!(s.calculate_slots(), 1);

    // a subsequent request is admitted again
    let (l, p) = request(4, 5);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(s.calculate_flows(), 2);
    assert_eq!(s.calculate_slots(), 0);
}

#[test]
fn test_announce_threshold() {
    // one flow on a hundred slots is a 1% change, below the 10% factor
    let mut s = server(100);
    let mut q = EventQueue::new();
    let config = Config::default();

    let (l, p) = request(1, 5);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(s.calculate_flows(), 1);
    assert_eq!(s.packets_sent(), 0);

    // ten flows reach the threshold
    for seq in 2..=10 {
        let (l, p) = request(seq, 5);
        s.handle_packet(l, p, &mut q, &config).unwrap();
    }
    assert_eq!(s.calculate_flows(), 10);
    assert_eq!(s.packets_sent(), 1);
}

#[test]
fn test_announce_tick_alignment() {
    let mut s = server(10);
    let mut q = EventQueue::new();
    let config = Config::default();

    // advance the clock off the tick boundary
    q.push_at(0.4, Event::Arrival { source: 99 });
    assert!(q.pop_until(1.0).is_some());
    assert_eq!(q.now(), 0.4);

    let (l, p) = request(1, 50);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    // the announcement is deferred to the next integer tick
    assert_eq!(s.packets_sent(), 0);

    // a second change before the tick does not schedule another one
    let (l, p) = request(2, 50);
    s.handle_packet(l, p, &mut q, &config).unwrap();
    let mut send_load_events = 0;
    while let Some(event) = q.pop_until(1.0) {
        match event {
            Event::SendLoad { service, .. } => {
                send_load_events += 1;
                assert_eq!(q.now(), 1.0);
                s.process_send_load(service, &mut q).unwrap();
            }
            Event::PortPull { .. } => s.port_pull(&mut q).unwrap(),
            _ => {}
        }
    }
    assert_eq!(send_load_events, 1);
    assert_eq!(s.packets_sent(), 1);
    assert_eq!(s.last_payload().no_of_flows, 2);
}

#[test]
fn test_background_load() {
    let mut s = server(10);
    let mut q = EventQueue::new();
    let config = Config::default();

    s.process_load_change(ServiceId::new("a"), 5, 5, &mut q, &config).unwrap();
    assert_eq!(s.calculate_load(), 5);
    assert_eq!(s.calculate_flows(), 5);
    assert_eq!(s.calculate_slots(), 5);
    assert_eq!(s.packets_sent(), 1);
    assert_eq!(s.last_payload().load, 5);

    // unchanged values do not announce again
    s.process_load_change(ServiceId::new("a"), 5, 5, &mut q, &config).unwrap();
    assert_eq!(s.packets_sent(), 1);
}

#[test]
fn test_flows_never_exceed_slots() {
    let mut s = server(3);
    let mut q = EventQueue::new();
    let config = Config::default();

    for seq in 1..=10 {
        let (l, p) = request(seq, 100);
        s.handle_packet(l, p, &mut q, &config).unwrap();
        assert!(s.calculate_flows() <= s.slots());
    }
    assert_eq!(s.calculate_flows(), 3);
}
