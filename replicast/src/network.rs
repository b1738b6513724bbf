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

//! # Top-level Network module
//!
//! This module represents the network topology, wires routers, servers and
//! clients together, seeds the unicast forwarding and latency tables from
//! shortest paths, and drives the discrete-event simulation.
//!
//! Wiring order: build the graph, create the devices, connect them with
//! links, then call [`Network::precompute_tables`] (done implicitly by the
//! first [`Network::run_until`]), register traffic sources, and run.

use crate::client::Client;
use crate::config::Config;
use crate::event::{Event, EventQueue};
use crate::link::{LinkEnd, SwitchPort};
use crate::packet::{Packet, PacketKind};
use crate::router::Router;
use crate::server::Server;
use crate::traffic::{LoadSource, RequestSource, TrafficSource};
use crate::types::{
    LinkWeight, NetworkDevice, NetworkError, NodeId, NodeKind, PhysNetwork, ServiceId, SimTime,
};

use log::*;
use petgraph::algo::bellman_ford;
use std::collections::HashMap;

#[derive(Debug)]
/// # Network struct
/// The struct contains all information about the underlying physical network
/// (links), manages all devices (routers, servers and clients), and handles
/// all events between them.
pub struct Network {
    net: PhysNetwork,
    links: Vec<(NodeId, NodeId)>,
    routers: HashMap<NodeId, Router>,
    servers: HashMap<NodeId, Server>,
    clients: HashMap<NodeId, Client>,
    names: HashMap<String, NodeId>,
    /// All-pairs path latency along the hop-count shortest paths. Read-only
    /// after setup.
    latency_table: HashMap<NodeId, HashMap<NodeId, LinkWeight>>,
    queue: EventQueue,
    sources: Vec<TrafficSource>,
    config: Config,
    tables_ready: bool,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Network {
    /// Generate an empty network with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            net: PhysNetwork::default(),
            links: Vec::new(),
            routers: HashMap::new(),
            servers: HashMap::new(),
            clients: HashMap::new(),
            names: HashMap::new(),
            latency_table: HashMap::new(),
            queue: EventQueue::new(),
            sources: Vec::new(),
            config,
            tables_ready: false,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current simulated time.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Add a new router to the topology. This function returns the id of the
    /// router, which can be used to reference it while configuring the
    /// network.
    pub fn add_router<S: Into<String>>(&mut self, name: S) -> NodeId {
        let name = name.into();
        let new_router = Router::new(name.clone(), self.net.add_node(()));
        let router_id = new_router.router_id();
        self.names.insert(name, router_id);
        self.routers.insert(router_id, new_router);
        self.tables_ready = false;
        router_id
    }

    /// Add a new server providing the given service, with the configured
    /// default slot capacity. The server must afterwards be attached to
    /// exactly one router with [`Network::add_link`].
    pub fn add_server<S: Into<String>>(&mut self, name: S, service: ServiceId) -> NodeId {
        let name = name.into();
        let new_server =
            Server::new(name.clone(), self.net.add_node(()), service, self.config.server_slots);
        let server_id = new_server.node_id();
        self.names.insert(name, server_id);
        self.servers.insert(server_id, new_server);
        self.tables_ready = false;
        server_id
    }

    /// Add a new client. The client must afterwards be attached to exactly
    /// one router with [`Network::add_link`].
    pub fn add_client<S: Into<String>>(&mut self, name: S) -> NodeId {
        let name = name.into();
        let new_client = Client::new(name.clone(), self.net.add_node(()));
        let client_id = new_client.node_id();
        self.names.insert(name, client_id);
        self.clients.insert(client_id, new_client);
        self.tables_ready = false;
        client_id
    }

    /// Create an undirected link between two devices, modeled as two
    /// opposing link ends with the given propagation delay.
    pub fn add_link(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: LinkWeight,
    ) -> Result<(), NetworkError> {
        let source_kind =
            self.kind_of(source).ok_or(NetworkError::DeviceNotFound(source))?;
        let target_kind =
            self.kind_of(target).ok_or(NetworkError::DeviceNotFound(target))?;
        if source_kind.is_host() && target_kind.is_host() {
            return Err(NetworkError::LinkBetweenHosts(source, target));
        }
        if self.has_link(source, target) {
            return Err(NetworkError::LinkExists(source, target));
        }
        self.links.push((source, target));
        self.net.add_edge(source, target, weight);
        self.net.add_edge(target, source, weight);
        let rate = self.config.link_rate;
        self.install_port(
            source,
            LinkEnd { src: source, dst: target, dst_kind: target_kind, propagation_delay: weight },
            rate,
        )?;
        self.install_port(
            target,
            LinkEnd { src: target, dst: source, dst_kind: source_kind, propagation_delay: weight },
            rate,
        )?;
        self.tables_ready = false;
        Ok(())
    }

    /// Check whether the two devices are directly connected.
    pub fn has_link(&self, a: NodeId, b: NodeId) -> bool {
        self.links.iter().any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
    }

    fn install_port(
        &mut self,
        node: NodeId,
        link: LinkEnd,
        rate: f64,
    ) -> Result<(), NetworkError> {
        let port = SwitchPort::new(link, rate);
        if let Some(r) = self.routers.get_mut(&node) {
            r.add_port(port);
            return Ok(());
        }
        if let Some(s) = self.servers.get_mut(&node) {
            return s.attach(port).map_err(|_| NetworkError::HostDegree(node, 2));
        }
        if let Some(c) = self.clients.get_mut(&node) {
            return c.attach(port).map_err(|_| NetworkError::HostDegree(node, 2));
        }
        Err(NetworkError::DeviceNotFound(node))
    }

    /// The kind of a device, or `None` if it does not exist.
    pub fn kind_of(&self, node: NodeId) -> Option<NodeKind> {
        if self.routers.contains_key(&node) {
            Some(NodeKind::Router)
        } else if self.servers.contains_key(&node) {
            Some(NodeKind::Server)
        } else if self.clients.contains_key(&node) {
            Some(NodeKind::Client)
        } else {
            None
        }
    }

    /// Get a reference to a device.
    pub fn get_device(&self, node: NodeId) -> NetworkDevice<'_> {
        if let Some(r) = self.routers.get(&node) {
            NetworkDevice::Router(r)
        } else if let Some(s) = self.servers.get(&node) {
            NetworkDevice::Server(s)
        } else if let Some(c) = self.clients.get(&node) {
            NetworkDevice::Client(c)
        } else {
            NetworkDevice::None
        }
    }

    /// Get mutable access to a server, e.g. to override its slot capacity
    /// before the run.
    pub fn get_server_mut(&mut self, node: NodeId) -> Result<&mut Server, NetworkError> {
        self.servers.get_mut(&node).ok_or(NetworkError::DeviceNotServer(node))
    }

    /// Look up a device id by name.
    pub fn get_node_id(&self, name: &str) -> Result<NodeId, NetworkError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| NetworkError::DeviceNameNotFound(name.to_string()))
    }

    /// Look up the name of a device.
    pub fn get_node_name(&self, node: NodeId) -> Result<&str, NetworkError> {
        match self.get_device(node) {
            NetworkDevice::Router(r) => Ok(r.name()),
            NetworkDevice::Server(s) => Ok(s.name()),
            NetworkDevice::Client(c) => Ok(c.name()),
            NetworkDevice::None => Err(NetworkError::DeviceNotFound(node)),
        }
    }

    /// All device ids, in graph order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.net.node_indices().collect()
    }

    /// All links as `(a, b)` pairs, in insertion order.
    pub fn links(&self) -> &[(NodeId, NodeId)] {
        &self.links
    }

    /// Path latency from `src` to `dst` along the hop-count shortest path,
    /// if both exist and are connected. Only valid after the tables have
    /// been computed.
    pub fn path_latency(&self, src: NodeId, dst: NodeId) -> Option<LinkWeight> {
        if src == dst {
            return Some(0.0);
        }
        self.latency_table.get(&src).and_then(|t| t.get(&dst)).copied()
    }

    /// Seed the unicast forwarding tables of all routers and the all-pairs
    /// latency table from hop-count shortest paths. Fails if a host is not
    /// attached to exactly one router.
    pub fn precompute_tables(&mut self) -> Result<(), NetworkError> {
        for (id, s) in self.servers.iter() {
            if !s.has_port() {
                return Err(NetworkError::HostDegree(*id, 0));
            }
        }
        for (id, c) in self.clients.iter() {
            if !c.has_port() {
                return Err(NetworkError::HostDegree(*id, 0));
            }
        }

        // shortest paths are over hop count: every edge counts 1. Nodes are
        // never removed, so rebuilding the graph in order reproduces the
        // indices.
        let mut hops_graph = PhysNetwork::default();
        for _ in self.net.node_indices() {
            hops_graph.add_node(());
        }
        for edge in self.net.edge_indices() {
            let (a, b) = self.net.edge_endpoints(edge).unwrap();
            hops_graph.add_edge(a, b, 1.0);
        }
        for router in self.routers.values_mut() {
            router.write_unicast_forwarding_table(&hops_graph);
        }

        // the latency table walks the same predecessor tree, but sums the
        // real propagation delays
        self.latency_table = HashMap::new();
        for src in self.net.node_indices() {
            let (_, predecessors) = bellman_ford(&hops_graph, src)
                .expect("hop-count graph has no negative edges");
            let mut row: HashMap<NodeId, LinkWeight> = HashMap::new();
            for dst in self.net.node_indices() {
                if dst == src {
                    continue;
                }
                let mut latency = 0.0;
                let mut lookup = dst;
                let reachable = loop {
                    let pred = match predecessors[lookup.index()] {
                        Some(p) => p,
                        None => break false,
                    };
                    latency += self.edge_weight(pred, lookup);
                    if pred == src {
                        break true;
                    }
                    lookup = pred;
                };
                if reachable {
                    row.insert(dst, latency);
                }
            }
            self.latency_table.insert(src, row);
        }
        self.tables_ready = true;
        Ok(())
    }

    fn edge_weight(&self, a: NodeId, b: NodeId) -> LinkWeight {
        self.net
            .find_edge(a, b)
            .and_then(|e| self.net.edge_weight(e))
            .copied()
            .unwrap_or(0.0)
    }

    /// Let a server announce its current state, e.g. to seed the RIBs at
    /// the beginning of a run.
    pub fn announce_service(&mut self, server: NodeId) -> Result<(), NetworkError> {
        let srv = self.servers.get_mut(&server).ok_or(NetworkError::DeviceNotServer(server))?;
        let service = srv.service().clone();
        let now = self.queue.now();
        srv.send_load_packet(now, service, &mut self.queue)?;
        Ok(())
    }

    /// Withdraw a replica from the network. Servers never withdraw on their
    /// own; this is a scripted driver action.
    pub fn withdraw_service(&mut self, server: NodeId) -> Result<(), NetworkError> {
        let srv = self.servers.get_mut(&server).ok_or(NetworkError::DeviceNotServer(server))?;
        srv.send_withdraw_packet(&mut self.queue)?;
        Ok(())
    }

    /// Schedule a single client request at the given simulated time. Times
    /// in the past fire immediately.
    pub fn send_request_at(
        &mut self,
        client: NodeId,
        service: ServiceId,
        size: u64,
        time: SimTime,
    ) -> Result<(), NetworkError> {
        if !self.clients.contains_key(&client) {
            return Err(NetworkError::DeviceNotClient(client));
        }
        self.queue.push_at(time, Event::SendRequest { client, service, size });
        Ok(())
    }

    /// Inject a background load event into a server, as a load generator
    /// would.
    pub fn inject_load(
        &mut self,
        server: NodeId,
        load: u32,
        no_of_flows: u32,
    ) -> Result<(), NetworkError> {
        let srv = self.servers.get_mut(&server).ok_or(NetworkError::DeviceNotServer(server))?;
        let service = srv.service().clone();
        srv.process_load_change(service, load, no_of_flows, &mut self.queue, &self.config)?;
        Ok(())
    }

    /// Register a client request source and schedule its first arrival.
    pub fn add_request_source(&mut self, mut source: RequestSource) -> Result<(), NetworkError> {
        if !self.clients.contains_key(&source.client) {
            return Err(NetworkError::DeviceNotClient(source.client));
        }
        let first = source.next_arrival();
        let index = self.sources.len();
        self.sources.push(TrafficSource::Request(source));
        self.queue.push_after(first, Event::Arrival { source: index });
        Ok(())
    }

    /// Register a background load source and schedule its first event.
    pub fn add_load_source(&mut self, mut source: LoadSource) -> Result<(), NetworkError> {
        if !self.servers.contains_key(&source.server) {
            return Err(NetworkError::DeviceNotServer(source.server));
        }
        let first = source.next_arrival();
        let index = self.sources.len();
        self.sources.push(TrafficSource::Load(source));
        self.queue.push_after(first, Event::Arrival { source: index });
        Ok(())
    }

    /// Run the simulation until the given simulated time. Events scheduled
    /// beyond the horizon are dropped.
    pub fn run_until(&mut self, until: SimTime) -> Result<(), NetworkError> {
        if !self.tables_ready {
            self.precompute_tables()?;
        }
        while let Some(event) = self.queue.pop_until(until) {
            self.dispatch(event)?;
        }
        self.queue.drain(until);
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), NetworkError> {
        match event {
            Event::Deliver { link, packet } => self.deliver(link, packet),
            Event::PortPull { node, neighbour } => {
                if let Some(r) = self.routers.get_mut(&node) {
                    r.port_pull(neighbour, &mut self.queue)?;
                } else if let Some(s) = self.servers.get_mut(&node) {
                    s.port_pull(&mut self.queue)?;
                } else if let Some(c) = self.clients.get_mut(&node) {
                    c.port_pull(&mut self.queue)?;
                }
                Ok(())
            }
            Event::FlowComplete { server, request } => {
                let srv = self
                    .servers
                    .get_mut(&server)
                    .ok_or(NetworkError::DeviceNotServer(server))?;
                srv.decrease_load(request, &mut self.queue, &self.config)?;
                Ok(())
            }
            Event::SendLoad { server, service } => {
                let srv = self
                    .servers
                    .get_mut(&server)
                    .ok_or(NetworkError::DeviceNotServer(server))?;
                srv.process_send_load(service, &mut self.queue)?;
                Ok(())
            }
            Event::Arrival { source } => self.arrival(source),
            Event::SendRequest { client, service, size } => {
                let c = self
                    .clients
                    .get_mut(&client)
                    .ok_or(NetworkError::DeviceNotClient(client))?;
                c.send_request(service, size, &mut self.queue)?;
                Ok(())
            }
            Event::LoadChange { server, service, load, no_of_flows } => {
                let srv = self
                    .servers
                    .get_mut(&server)
                    .ok_or(NetworkError::DeviceNotServer(server))?;
                srv.process_load_change(service, load, no_of_flows, &mut self.queue, &self.config)?;
                Ok(())
            }
        }
    }

    fn deliver(&mut self, link: LinkEnd, packet: Packet) -> Result<(), NetworkError> {
        match self.kind_of(link.dst) {
            Some(NodeKind::Router) => {
                let router = self.routers.get_mut(&link.dst).unwrap();
                router.handle_packet(link, packet, &mut self.queue, &self.config)?;
                Ok(())
            }
            Some(NodeKind::Server) => {
                if matches!(packet.kind, PacketKind::ClientRequest) {
                    // global observer: compare the replica the routing chose
                    // against the currently ideal one
                    self.best_replica_utility(link.dst, &packet);
                }
                let server = self.servers.get_mut(&link.dst).unwrap();
                server.handle_packet(link, packet, &mut self.queue, &self.config)?;
                Ok(())
            }
            Some(NodeKind::Client) => {
                let client = self.clients.get_mut(&link.dst).unwrap();
                client.handle_packet(link, packet, &mut self.queue)?;
                Ok(())
            }
            None => {
                warn!(
                    "{:.3}: PACKET {}.{} delivered to unknown device {:?}",
                    self.queue.now(),
                    packet.src.index(),
                    packet.seq,
                    link.dst
                );
                Ok(())
            }
        }
    }

    fn arrival(&mut self, source: usize) -> Result<(), NetworkError> {
        enum Action {
            Request { client: NodeId, service: ServiceId, size: u64 },
            Load { server: NodeId, service: ServiceId, load: u32, no_of_flows: u32 },
        }
        let (action, next) = match self.sources.get_mut(source) {
            Some(TrafficSource::Request(src)) => {
                let size = src.next_size();
                let action = Action::Request {
                    client: src.client,
                    service: src.service.clone(),
                    size,
                };
                (action, src.next_arrival())
            }
            Some(TrafficSource::Load(src)) => {
                let (load, no_of_flows) = src.next_values();
                let action = Action::Load {
                    server: src.server,
                    service: src.service.clone(),
                    load,
                    no_of_flows,
                };
                (action, src.next_arrival())
            }
            None => return Ok(()),
        };
        self.queue.push_after(next, Event::Arrival { source });
        match action {
            Action::Request { client, service, size } => {
                let c = self
                    .clients
                    .get_mut(&client)
                    .ok_or(NetworkError::DeviceNotClient(client))?;
                c.send_request(service, size, &mut self.queue)?;
            }
            Action::Load { server, service, load, no_of_flows } => {
                let s = self
                    .servers
                    .get_mut(&server)
                    .ok_or(NetworkError::DeviceNotServer(server))?;
                s.process_load_change(service, load, no_of_flows, &mut self.queue, &self.config)?;
            }
        }
        Ok(())
    }

    /// Log the utility of the replica which served a request against the
    /// utility of the currently ideal replica, using the global latency
    /// table. Purely an observer; routing is not affected.
    fn best_replica_utility(&self, serving: NodeId, packet: &Packet) {
        if !log_enabled!(Level::Info) {
            return;
        }
        let client = packet.src;
        let mut utilities: Vec<(NodeId, u32, LinkWeight, f64)> = Vec::new();
        for (id, server) in self.servers.iter() {
            let load = server.calculate_load();
            let latency = match self.path_latency(*id, client) {
                Some(latency) => latency,
                None => continue,
            };
            let utility =
                (self.config.forwarding_utility_fn)(self.config.alpha, load as f64, latency);
            utilities.push((*id, load, latency, utility));
        }
        let best = utilities
            .iter()
            .min_by(|a, b| a.3.partial_cmp(&b.3).unwrap())
            .copied();
        let selected = utilities.iter().find(|(id, _, _, _)| *id == serving).copied();
        if let (Some(best), Some(selected)) = (best, selected) {
            // the serving replica counts as best on a utility tie
            let best = if (best.3 - selected.3).abs() == 0.0 { selected } else { best };
            info!(
                "{:.3}: BEST_REPLICA_UTILITY '{}' pkt: {}.{} selected: {} load({}) latency({}) utility({:.4}) best: {} load({}) latency({}) utility({:.4}) {}",
                self.queue.now(),
                self.get_node_name(serving).unwrap_or("?"),
                packet.src.index(),
                packet.seq,
                selected.0.index(),
                selected.1,
                selected.2,
                selected.3,
                best.0.index(),
                best.1,
                best.2,
                best.3,
                if best.0 == selected.0 { "SAME" } else { "DIFFERENT" }
            );
        }
    }
}
