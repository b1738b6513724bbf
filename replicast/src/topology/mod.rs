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

//! # Topology input
//!
//! A router backbone can be built from a programmatic adjacency list or
//! from a GML-style topology file. Both forms create routers only; servers
//! and clients are attached afterwards through
//! [`Network::add_server`](crate::network::Network::add_server) and
//! [`Network::add_client`](crate::network::Network::add_client).

pub mod gml_parser;

use crate::config::Config;
use crate::network::Network;
use crate::types::{LinkWeight, NetworkError};

/// A programmatic adjacency list: every entry is a node with its neighbors
/// and the link weight towards them. Entries may repeat links in both
/// directions; duplicates are ignored.
pub type Adjacency<'a> = Vec<(&'a str, Vec<(&'a str, LinkWeight)>)>;

impl Network {
    /// Build a router backbone from an adjacency list. Routers are created
    /// in list order.
    pub fn from_adjacency(adj: &Adjacency<'_>, config: Config) -> Result<Self, NetworkError> {
        let mut net = Network::new(config);
        for (name, _) in adj.iter() {
            net.add_router(*name);
        }
        for (name, neighbours) in adj.iter() {
            let a = net.get_node_id(name)?;
            for (neighbour, weight) in neighbours.iter() {
                let b = net.get_node_id(neighbour)?;
                if !net.has_link(a, b) {
                    net.add_link(a, b, *weight)?;
                }
            }
        }
        Ok(net)
    }

    /// Build a router backbone from a GML-style topology file.
    pub fn from_gml_file(filename: impl AsRef<str>, config: Config) -> Result<Self, NetworkError> {
        let graph = gml_parser::parse_gml_file(filename)?;
        Self::from_gml_graph(&graph, config)
    }

    /// Build a router backbone from GML content in a string.
    pub fn from_gml_str(content: &str, config: Config) -> Result<Self, NetworkError> {
        let graph = gml_parser::parse_gml(content)?;
        Self::from_gml_graph(&graph, config)
    }

    fn from_gml_graph(
        graph: &petgraph::Graph<gml_parser::NodeData, LinkWeight, petgraph::Undirected, u32>,
        config: Config,
    ) -> Result<Self, NetworkError> {
        let mut net = Network::new(config);
        let mut ids = Vec::with_capacity(graph.node_count());
        for node in graph.node_indices() {
            ids.push(net.add_router(graph.node_weight(node).unwrap().name.clone()));
        }
        for edge in graph.edge_indices() {
            let (a, b) = graph.edge_endpoints(edge).unwrap();
            let weight = *graph.edge_weight(edge).unwrap();
            net.add_link(ids[a.index()], ids[b.index()], weight)?;
        }
        Ok(net)
    }
}
