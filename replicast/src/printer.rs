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

//! # Helper (printer) functions for the Network
//! Module containing helper functions to get formatted strings and print
//! information about the network, with device names inserted.

use crate::network::Network;
use crate::types::{NetworkDevice, NetworkError, NodeId};
use itertools::Itertools;
use std::io::{self, Write};

/// Get a vector of strings, which represent the metric table (service RIB)
/// of a router. Each string is one row, formatted with device names.
pub fn metric_table(net: &Network, router: NodeId) -> Result<Vec<String>, NetworkError> {
    let r = match net.get_device(router) {
        NetworkDevice::Router(r) => r,
        _ => return Err(NetworkError::DeviceNotFound(router)),
    };
    let mut result = Vec::new();
    for (doc_id, e) in r.service_rib().iter() {
        result.push(format!(
            "[{id}] service: {service}, replica: {replica}, neighbour: {neighbour}, load: {load}, flows: {flows}, delay: {delay}, slots: {slots}, msgID: {msg}, time: {time:.3}",
            id = doc_id,
            service = e.service,
            replica = net.get_node_name(e.replica)?,
            neighbour = net.get_node_name(e.neighbour)?,
            load = e.load,
            flows = e.no_of_flows,
            delay = e.delay,
            slots = e.slots,
            msg = e.msg_id,
            time = e.creation_time,
        ));
    }
    Ok(result)
}

/// Get a vector of strings representing the sent table of a router, one per
/// outstanding `(metric, neighbour)` pair.
pub fn sent_table(net: &Network, router: NodeId) -> Result<Vec<String>, NetworkError> {
    let r = match net.get_device(router) {
        NetworkDevice::Router(r) => r,
        _ => return Err(NetworkError::DeviceNotFound(router)),
    };
    let mut result = Vec::new();
    for (doc_id, neighbour) in r.sent_table().iter() {
        result.push(format!("metric no {} --> {}", doc_id, net.get_node_name(neighbour)?));
    }
    Ok(result)
}

/// Get a single string representing the service forwarding table of a
/// router.
pub fn service_forwarding_table(net: &Network, router: NodeId) -> Result<String, NetworkError> {
    let r = match net.get_device(router) {
        NetworkDevice::Router(r) => r,
        _ => return Err(NetworkError::DeviceNotFound(router)),
    };
    let mut entries: Vec<(String, NodeId)> = r
        .service_forwarding_table()
        .iter()
        .map(|(s, n)| (s.to_string(), *n))
        .collect();
    entries.sort();
    Ok(format!(
        "{{{}}}",
        entries
            .into_iter()
            .map(|(s, n)| {
                format!("{}: {}", s, net.get_node_name(n).unwrap_or("?"))
            })
            .join(", ")
    ))
}

/// Write the topology as an undirected graphviz graph: clients are pink
/// eggs, servers yellow parallelograms, and routers fixed-width circles.
pub fn graphviz(net: &Network, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Graph G {{")?;
    writeln!(out, "  splines=polyline")?;
    for node in net.nodes() {
        let name = net.get_node_name(node).unwrap_or("?");
        match net.get_device(node) {
            NetworkDevice::Client(_) => {
                writeln!(out, "  {} [shape=egg, style=\"filled\", fillcolor=\"pink\"];", name)?
            }
            NetworkDevice::Server(_) => writeln!(
                out,
                "  {} [shape=parallelogram, style=\"filled\", fillcolor=\"yellow\"];",
                name
            )?,
            _ => writeln!(out, "  {} [shape=circle, fixedsize=true, width=1];", name)?,
        }
    }
    for (a, b) in net.links() {
        writeln!(
            out,
            "  {} -- {};",
            net.get_node_name(*a).unwrap_or("?"),
            net.get_node_name(*b).unwrap_or("?")
        )?;
    }
    writeln!(out, "}}")
}
