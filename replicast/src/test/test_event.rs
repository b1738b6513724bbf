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

use crate::event::{Event, EventQueue};

fn marker(source: usize) -> Event {
    Event::Arrival { source }
}

#[test]
fn test_time_ordering() {
    let mut q = EventQueue::new();
    q.push_at(3.0, marker(3));
    q.push_at(1.0, marker(1));
    q.push_at(2.0, marker(2));

    assert_eq!(q.pop_until(10.0), Some(marker(1)));
    assert_eq!(q.now(), 1.0);
    assert_eq!(q.pop_until(10.0), Some(marker(2)));
    assert_eq!(q.pop_until(10.0), Some(marker(3)));
    assert_eq!(q.now(), 3.0);
    assert_eq!(q.pop_until(10.0), None);
}

#[test]
fn test_fifo_tie_break() {
    // events scheduled for the same simulated time fire in insertion order
    let mut q = EventQueue::new();
    for i in 0..10 {
        q.push_at(5.0, marker(i));
    }
    for i in 0..10 {
        assert_eq!(q.pop_until(5.0), Some(marker(i)));
    }
    assert!(q.is_empty());
}

#[test]
fn test_horizon() {
    let mut q = EventQueue::new();
    q.push_at(1.0, marker(1));
    q.push_at(2.5, marker(2));

    // the horizon is inclusive
    assert_eq!(q.pop_until(1.0), Some(marker(1)));
    assert_eq!(q.pop_until(1.0), None);
    assert_eq!(q.len(), 1);

    // draining drops everything beyond the horizon
    q.drain(2.0);
    assert!(q.is_empty());
    assert_eq!(q.now(), 2.0);
}

#[test]
fn test_push_after() {
    let mut q = EventQueue::new();
    q.push_at(2.0, marker(1));
    assert_eq!(q.pop_until(10.0), Some(marker(1)));
    q.push_after(1.5, marker(2));
    assert_eq!(q.pop_until(10.0), Some(marker(2)));
    assert_eq!(q.now(), 3.5);
}

#[test]
fn test_push_into_past_is_clamped() {
    let mut q = EventQueue::new();
    q.push_at(5.0, marker(1));
    assert_eq!(q.pop_until(10.0), Some(marker(1)));
    q.push_at(1.0, marker(2));
    assert_eq!(q.pop_until(10.0), Some(marker(2)));
    assert_eq!(q.now(), 5.0);
}
