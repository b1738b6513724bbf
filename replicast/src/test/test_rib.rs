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

use crate::link::LinkEnd;
use crate::rib::{Rib, RibEntry, SentTable};
use crate::types::{NodeKind, ServiceId};
use maplit::btreeset;

fn entry(replica: u32, neighbour: u32, load: u32) -> RibEntry {
    RibEntry {
        replica: replica.into(),
        neighbour: neighbour.into(),
        link: LinkEnd {
            src: neighbour.into(),
            dst: 0.into(),
            dst_kind: NodeKind::Router,
            propagation_delay: 1.0,
        },
        msg_id: 1,
        service: ServiceId::new("a"),
        creation_time: 0.0,
        load,
        no_of_flows: 0,
        delay: 1.0,
        slots: 10,
    }
}

#[test]
fn test_stable_doc_ids() {
    let mut rib = Rib::new();
    let d1 = rib.insert(entry(10, 1, 0));
    let d2 = rib.insert(entry(11, 1, 0));
    assert_ne!(d1, d2);

    // mutating a row keeps its id
    rib.get_mut(d1).unwrap().load = 5;
    assert_eq!(rib.get(d1).unwrap().load, 5);
    assert_eq!(rib.find_replica(10.into()).unwrap().0, d1);

    // removing and re-inserting yields a fresh id
    rib.remove(d1).unwrap();
    assert!(rib.get(d1).is_none());
    let d3 = rib.insert(entry(10, 1, 0));
    assert_ne!(d3, d1);
    assert_ne!(d3, d2);
}

#[test]
fn test_find_replica() {
    let mut rib = Rib::new();
    assert!(rib.is_empty());
    let d1 = rib.insert(entry(10, 1, 3));
    rib.insert(entry(11, 2, 4));

    let (found, row) = rib.find_replica(10.into()).unwrap();
    assert_eq!(found, d1);
    assert_eq!(row.load, 3);
    assert!(rib.find_replica(99.into()).is_none());
    assert_eq!(rib.len(), 2);
}

#[test]
fn test_service_rows() {
    let mut rib = Rib::new();
    let d1 = rib.insert(entry(10, 1, 0));
    let d2 = rib.insert(RibEntry { service: ServiceId::new("b"), ..entry(11, 1, 0) });
    let rows: Vec<_> = rib.service_rows(&ServiceId::new("a")).map(|(d, _)| d).collect();
    assert_eq!(rows, vec![d1]);
    let rows: Vec<_> = rib.service_rows(&ServiceId::new("b")).map(|(d, _)| d).collect();
    assert_eq!(rows, vec![d2]);
}

#[test]
fn test_sent_table() {
    let mut sent = SentTable::new();
    assert!(sent.insert(1, 7.into()));
    assert!(!sent.insert(1, 7.into()));
    assert!(sent.insert(1, 8.into()));
    assert!(sent.insert(2, 7.into()));

    assert!(sent.contains(1, 7.into()));
    assert!(!sent.contains(2, 8.into()));
    assert_eq!(sent.docs(), btreeset![1, 2]);

    assert!(sent.remove(1, 7.into()));
    assert!(!sent.remove(1, 7.into()));
    assert_eq!(sent.remove_doc(1), 1);
    assert_eq!(sent.docs(), btreeset![2]);
    assert_eq!(sent.len(), 1);
}
