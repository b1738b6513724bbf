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
use crate::packet::{LoadOperation, LoadPayload, Packet, PacketKind, ServerLoad};
use crate::router::Router;
use crate::types::{Address, NodeKind, ServiceId};
use assert_approx_eq::assert_approx_eq;
use maplit::{btreeset, hashmap};

/// The router under test has id 0; neighbors are numbered from 1.
fn router_with_neighbours(n: u32) -> Router {
    let mut r = Router::new("x".to_string(), 0.into());
    for i in 1..=n {
        r.add_port(SwitchPort::new(
            LinkEnd {
                src: 0.into(),
                dst: i.into(),
                dst_kind: NodeKind::Router,
                propagation_delay: 1.0,
            },
            f64::INFINITY,
        ));
    }
    r
}

fn host_port(host: u32) -> SwitchPort {
    SwitchPort::new(
        LinkEnd {
            src: 0.into(),
            dst: host.into(),
            dst_kind: NodeKind::Server,
            propagation_delay: 1.0,
        },
        f64::INFINITY,
    )
}

/// A ServerLoad packet arriving over a zero-delay link, so the stored delay
/// equals the payload delay.
fn server_load(
    replica: u32,
    from: u32,
    time: f64,
    seq: usize,
    operation: LoadOperation,
    load: u32,
    delay: f64,
) -> (LinkEnd, Packet) {
    let link = LinkEnd {
        src: from.into(),
        dst: 0.into(),
        dst_kind: NodeKind::Router,
        propagation_delay: 0.0,
    };
    let packet = Packet {
        time,
        size: 3,
        seq,
        src: from.into(),
        dst: Address::Node(0.into()),
        flow_id: 0,
        kind: PacketKind::ServerLoad(ServerLoad {
            service: ServiceId::new("a"),
            replica: replica.into(),
            operation,
            payload: LoadPayload { load, no_of_flows: 0, delay, slots: 10 },
        }),
    };
    (link, packet)
}

/// Run the ports until all queued transmissions are delivered, and collect
/// the delivered packets.
fn drain_packets(r: &mut Router, q: &mut EventQueue) -> Vec<(LinkEnd, Packet)> {
    let mut out = Vec::new();
    while let Some(event) = q.pop_until(f64::INFINITY) {
        match event {
            Event::PortPull { neighbour, .. } => r.port_pull(neighbour, q).unwrap(),
            Event::Deliver { link, packet } => out.push((link, packet)),
            _ => {}
        }
    }
    out
}

fn replica_of(packet: &Packet) -> (u32, LoadOperation) {
    match &packet.kind {
        PacketKind::ServerLoad(sl) => (sl.replica.index() as u32, sl.operation),
        _ => panic!("expected a ServerLoad packet"),
    }
}

#[test]
fn test_pareto_announce_set() {
    // four replicas, one arriving per neighbor; a fifth neighbor only
    // receives announcements
    let mut r = router_with_neighbours(5);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! {
        10.into() => Some((1.into(), 1)),
        11.into() => Some((2.into(), 1)),
        12.into() => Some((3.into(), 1)),
        13.into() => Some((4.into(), 1)),
    };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 3, 20.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let (l, p) = server_load(11, 2, 1.0, 1, LoadOperation::Announce, 2, 30.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let (l, p) = server_load(12, 3, 1.0, 1, LoadOperation::Announce, 1, 40.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let (l, p) = server_load(13, 4, 1.0, 1, LoadOperation::Announce, 100, 100.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();

    assert_eq!(r.service_rib().len(), 4);
    let d1 = r.service_rib().find_replica(10.into()).unwrap().0;
    let d2 = r.service_rib().find_replica(11.into()).unwrap().0;
    let d3 = r.service_rib().find_replica(12.into()).unwrap().0;
    let d4 = r.service_rib().find_replica(13.into()).unwrap().0;

    // the dominated replica is not re-advertised
    assert_eq!(r.sent_table().docs(), btreeset![d1, d2, d3]);
    assert!(!r.sent_table().docs().contains(&d4));
    let sent = drain_packets(&mut r, &mut q);
    assert!(sent.iter().all(|(_, p)| replica_of(p).0 != 13));
}

#[test]
fn test_dispatch_split_horizon_and_hosts() {
    // neighbors 1 and 2 are routers, 3 is a host
    let mut r = router_with_neighbours(2);
    r.add_port(host_port(3));
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! {
        10.into() => Some((1.into(), 1)),
        11.into() => Some((2.into(), 1)),
    };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);

    // not back over the arrival link, and never into hosts
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dst, 2.into());
    let d1 = r.service_rib().find_replica(10.into()).unwrap().0;
    assert_eq!(r.sent_table().docs(), btreeset![d1]);

    // a dominating replica triggers a withdraw of the dominated row
    let (l, p) = server_load(11, 2, 2.0, 1, LoadOperation::Announce, 1, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);
    let d2 = r.service_rib().find_replica(11.into()).unwrap().0;

    // announce of the new row towards 1, withdraw of the old row towards 2
    assert_eq!(sent.len(), 2);
    let announce = sent
        .iter()
        .find(|(_, p)| replica_of(p) == (11, LoadOperation::Announce))
        .unwrap();
    assert_eq!(announce.0.dst, 1.into());
    let withdraw = sent
        .iter()
        .find(|(_, p)| replica_of(p) == (10, LoadOperation::Withdraw))
        .unwrap();
    assert_eq!(withdraw.0.dst, 2.into());

    // the dominated row stays in the RIB so it can return later
    assert_eq!(r.service_rib().len(), 2);
    assert_eq!(r.sent_table().docs(), btreeset![d2]);
}

#[test]
fn test_idempotent_update() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(drain_packets(&mut r, &mut q).len(), 1);
    let sent_before: Vec<_> = r.sent_table().iter().collect();

    // an exactly identical update must not produce any outbound packet nor
    // mutate the sent table
    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());
    let sent_after: Vec<_> = r.sent_table().iter().collect();
    assert_eq!(sent_before, sent_after);
}

#[test]
fn test_stale_update_dropped() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 5.0, 2, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    drain_packets(&mut r, &mut q);

    // an update with an older creation time is silently dropped
    let (l, p) = server_load(10, 1, 3.0, 1, LoadOperation::Announce, 9, 9.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());
    let (_, row) = r.service_rib().find_replica(10.into()).unwrap();
    assert_eq!(row.load, 3);
    assert_eq!(row.creation_time, 5.0);
}

#[test]
fn test_loop_avoidance() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    // arrival over the wrong link: the unicast route points at neighbor 1
    let (l, p) = server_load(10, 2, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(r.service_rib().is_empty());
    assert!(drain_packets(&mut r, &mut q).is_empty());

    // replica unknown to the unicast routing: drop as well
    let (l, p) = server_load(99, 1, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(r.service_rib().is_empty());
}

#[test]
fn test_marked_row_is_resent() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 1, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(drain_packets(&mut r, &mut q).len(), 1);

    // the update is worse, but neighbor 2 still holds the old values, so
    // the row is re-announced despite being in the sent table
    let (l, p) = server_load(10, 1, 2.0, 2, LoadOperation::Announce, 5, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dst, 2.into());
    match &sent[0].1.kind {
        PacketKind::ServerLoad(sl) => assert_eq!(sl.payload.load, 5),
        _ => panic!("expected a ServerLoad packet"),
    }
    let d1 = r.service_rib().find_replica(10.into()).unwrap().0;
    assert_eq!(r.sent_table().docs(), btreeset![d1]);
}

#[test]
fn test_better_update_is_resent() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 5, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(drain_packets(&mut r, &mut q).len(), 1);

    // the load dropped: neighbor 2 still holds the old, too-high values and
    // must learn the improvement even though the row is in the sent table
    let (l, p) = server_load(10, 1, 2.0, 2, LoadOperation::Announce, 2, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dst, 2.into());
    match &sent[0].1.kind {
        PacketKind::ServerLoad(sl) => assert_eq!(sl.payload.load, 2),
        _ => panic!("expected a ServerLoad packet"),
    }
    let d1 = r.service_rib().find_replica(10.into()).unwrap().0;
    assert_eq!(r.sent_table().docs(), btreeset![d1]);
}

#[test]
fn test_withdraw_processing() {
    let mut r = router_with_neighbours(3);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(drain_packets(&mut r, &mut q).len(), 2);
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(1.into()));

    let (l, p) = server_load(10, 1, 2.0, 2, LoadOperation::Withdraw, 3, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);

    // the withdraw is forwarded exactly where the announce went
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(_, p)| replica_of(p) == (10, LoadOperation::Withdraw)));
    assert_eq!(
        sent.iter().map(|(l, _)| l.dst).collect::<std::collections::BTreeSet<_>>(),
        [2.into(), 3.into()].iter().copied().collect()
    );

    // row deleted, sent table cleared, forwarding entry removed
    assert!(r.service_rib().is_empty());
    assert!(r.sent_table().is_empty());
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), None);
}

#[test]
fn test_withdraw_unknown_replica() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Withdraw, 0, 0.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());
}

#[test]
fn test_damping_keeps_current_choice() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! {
        10.into() => Some((1.into(), 1)),
        11.into() => Some((2.into(), 1)),
    };

    // alpha = 0, so the utility is the accumulated delay
    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 0, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(1.into()));

    // 1.95 improves on 2.00 by less than the damping factor of 0.1
    let (l, p) = server_load(11, 2, 1.0, 1, LoadOperation::Announce, 0, 1.95);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(1.into()));
    let best = r.best_replica(&ServiceId::new("a")).unwrap();
    assert_eq!(best.replica, 10.into());
    assert_approx_eq!(best.utility, 2.0);
}

#[test]
fn test_damping_swaps_on_small_factor() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config { forwarding_utility_change_factor: 0.01, ..Config::default() };
    r.unicast_forwarding_table = hashmap! {
        10.into() => Some((1.into(), 1)),
        11.into() => Some((2.into(), 1)),
    };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 0, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let (l, p) = server_load(11, 2, 1.0, 1, LoadOperation::Announce, 0, 1.95);
    r.handle_packet(l, p, &mut q, &config).unwrap();

    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(2.into()));
    let best = r.best_replica(&ServiceId::new("a")).unwrap();
    assert_eq!(best.replica, 11.into());
    assert_approx_eq!(best.utility, 1.95);
}

#[test]
fn test_withdraw_of_selected_replica_bypasses_damping() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! {
        10.into() => Some((1.into(), 1)),
        11.into() => Some((2.into(), 1)),
    };

    // two near-equal candidates: the second improvement is damped away
    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 0, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    let (l, p) = server_load(11, 2, 1.0, 1, LoadOperation::Announce, 0, 1.95);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(1.into()));

    // withdrawing the selected replica must move the entry to the survivor,
    // even though the utilities differ by less than the damping factor
    let (l, p) = server_load(10, 1, 2.0, 2, LoadOperation::Withdraw, 0, 2.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    assert!(r.service_rib().find_replica(10.into()).is_none());
    assert_eq!(r.service_next_hop(&ServiceId::new("a")), Some(2.into()));
    let best = r.best_replica(&ServiceId::new("a")).unwrap();
    assert_eq!(best.replica, 11.into());
    assert_approx_eq!(best.utility, 1.95);
}

#[test]
fn test_client_request_forwarding() {
    let mut r = router_with_neighbours(2);
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! { 10.into() => Some((1.into(), 1)) };

    let (l, p) = server_load(10, 1, 1.0, 1, LoadOperation::Announce, 0, 1.0);
    r.handle_packet(l, p, &mut q, &config).unwrap();
    drain_packets(&mut r, &mut q);

    // a request for the known service follows the service forwarding table
    let link = LinkEnd {
        src: 2.into(),
        dst: 0.into(),
        dst_kind: NodeKind::Router,
        propagation_delay: 0.0,
    };
    let request = Packet {
        time: 3.0,
        size: 5,
        seq: 1,
        src: 20.into(),
        dst: Address::Service(ServiceId::new("a")),
        flow_id: 0,
        kind: PacketKind::ClientRequest,
    };
    r.handle_packet(link, request, &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dst, 1.into());
    assert_eq!(sent[0].1.dst, Address::Service(ServiceId::new("a")));

    // a request for an unknown service is dropped
    let request = Packet {
        time: 3.0,
        size: 5,
        seq: 2,
        src: 20.into(),
        dst: Address::Service(ServiceId::new("nope")),
        flow_id: 0,
        kind: PacketKind::ClientRequest,
    };
    r.handle_packet(link, request, &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());
}

#[test]
fn test_unicast_forwarding() {
    let mut r = router_with_neighbours(2);
    r.add_port(host_port(3));
    let mut q = EventQueue::new();
    let config = Config::default();
    r.unicast_forwarding_table = hashmap! {
        50.into() => Some((2.into(), 3)),
        3.into()  => Some((3.into(), 1)),
        60.into() => Some((3.into(), 2)),
    };

    let link = LinkEnd {
        src: 1.into(),
        dst: 0.into(),
        dst_kind: NodeKind::Router,
        propagation_delay: 0.0,
    };
    let data = |seq: usize, dst: u32| Packet {
        time: 0.0,
        size: 1,
        seq,
        src: 1.into(),
        dst: Address::Node(dst.into()),
        flow_id: 0,
        kind: PacketKind::Data,
    };

    // forwarded along the table
    r.handle_packet(link, data(1, 50), &mut q, &config).unwrap();
    let sent = drain_packets(&mut r, &mut q);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.dst, 2.into());

    // delivered into a host only when the host is the destination
    r.handle_packet(link, data(2, 3), &mut q, &config).unwrap();
    assert_eq!(drain_packets(&mut r, &mut q).len(), 1);
    r.handle_packet(link, data(3, 60), &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());

    // unknown destination: dropped
    r.handle_packet(link, data(4, 99), &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());

    // never back over the arrival link
    let link_from_2 = LinkEnd {
        src: 2.into(),
        dst: 0.into(),
        dst_kind: NodeKind::Router,
        propagation_delay: 0.0,
    };
    r.handle_packet(link_from_2, data(5, 50), &mut q, &config).unwrap();
    assert!(drain_packets(&mut r, &mut q).is_empty());
}
