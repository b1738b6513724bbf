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

//! Module defining a transit router with the service-anycast control plane.
//!
//! A router keeps a unicast forwarding table (seeded from shortest paths
//! before the run), a service RIB of candidate replicas, a sent table of
//! outstanding announcements, and a service forwarding table pointing each
//! service at the neighbor leading to the currently best replica.

use crate::config::{Config, Metric};
use crate::event::EventQueue;
use crate::link::{LinkEnd, SwitchPort};
use crate::packet::{
    LoadOperation, LoadPayload, Packet, PacketKind, ServerLoad, SERVER_LOAD_PACKET_SIZE,
};
use crate::rib::{DocId, Rib, RibEntry, SentTable};
use crate::types::{Address, DeviceError, NodeId, ServiceId, SimTime};
use itertools::Itertools;
use log::*;
use petgraph::algo::bellman_ford;
use std::collections::HashMap;

/// Outcome of comparing one RIB entry against another over all metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    /// Equal on every metric
    Same,
    /// Better or equal on every metric, strictly better on at least one
    Better,
    /// Worse on at least one metric
    Worse,
}

/// Why a withdraw is dispatched for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WithdrawReason {
    /// The row fell out of the announce-set; it stays in the RIB and may
    /// return later.
    ParetoDrop,
    /// A Withdraw was received for the replica; the row is deleted.
    Received,
}

/// The currently selected replica for a service.
#[derive(Debug, Clone, PartialEq)]
pub struct BestReplica {
    /// The selected replica
    pub replica: NodeId,
    /// The neighbor on the path towards it
    pub neighbour: NodeId,
    /// Its utility at selection time
    pub utility: f64,
}

/// A transit router.
#[derive(Debug, Clone)]
pub struct Router {
    /// Name of the router
    name: String,
    /// ID of the router
    router_id: NodeId,
    /// Per-neighbor transmit queues, ordered by insertion
    ports: Vec<SwitchPort>,
    /// Unicast forwarding table: destination to `(next_hop, hop_count)`, or
    /// `None` if the destination is unreachable. Seeded once before the run.
    pub(crate) unicast_forwarding_table: HashMap<NodeId, Option<(NodeId, u32)>>,
    /// The service RIB
    rib: Rib,
    /// The sent table
    sent_table: SentTable,
    /// Service forwarding table: service to next-hop neighbor
    service_forwarding_table: HashMap<ServiceId, NodeId>,
    /// Currently selected replica per service, with its utility
    best: HashMap<ServiceId, BestReplica>,
}

impl Router {
    pub(crate) fn new(name: String, router_id: NodeId) -> Router {
        Router {
            name,
            router_id,
            ports: Vec::new(),
            unicast_forwarding_table: HashMap::new(),
            rib: Rib::new(),
            sent_table: SentTable::new(),
            service_forwarding_table: HashMap::new(),
            best: HashMap::new(),
        }
    }

    /// Return the id of the router.
    pub fn router_id(&self) -> NodeId {
        self.router_id
    }

    /// Return the name of the router.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Return the service RIB.
    pub fn service_rib(&self) -> &Rib {
        &self.rib
    }

    /// Return the sent table.
    pub fn sent_table(&self) -> &SentTable {
        &self.sent_table
    }

    /// Return the next hop for a service, if one is selected.
    pub fn service_next_hop(&self, service: &ServiceId) -> Option<NodeId> {
        self.service_forwarding_table.get(service).copied()
    }

    /// Return the service forwarding table.
    pub fn service_forwarding_table(&self) -> &HashMap<ServiceId, NodeId> {
        &self.service_forwarding_table
    }

    /// Return the currently selected replica for a service.
    pub fn best_replica(&self, service: &ServiceId) -> Option<&BestReplica> {
        self.best.get(service)
    }

    /// Returns the unicast forwarding table. The table maps every node in
    /// the network to a tuple `(next_hop, hop_count)`, or `None` if it is
    /// unreachable.
    pub fn get_unicast_fw_table(&self) -> &HashMap<NodeId, Option<(NodeId, u32)>> {
        &self.unicast_forwarding_table
    }

    /// The neighbors of this router, in port order.
    pub fn neighbours(&self) -> Vec<NodeId> {
        self.ports.iter().map(|p| p.neighbour()).collect()
    }

    pub(crate) fn add_port(&mut self, port: SwitchPort) {
        self.ports.push(port);
    }

    pub(crate) fn port_index(&self, neighbour: NodeId) -> Option<usize> {
        self.ports.iter().position(|p| p.neighbour() == neighbour)
    }

    pub(crate) fn port_pull(
        &mut self,
        neighbour: NodeId,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let idx = self.port_index(neighbour).ok_or(DeviceError::NoPortTo(neighbour))?;
        self.ports[idx].pull(queue);
        Ok(())
    }

    /// Write the unicast forwarding table based on the hop-count graph (the
    /// physical graph with every edge weight set to 1). This function
    /// requires that all node ids are set to the graph id.
    pub(crate) fn write_unicast_forwarding_table(&mut self, hops_graph: &crate::types::PhysNetwork) {
        self.unicast_forwarding_table = HashMap::new();
        // compute shortest path to all other nodes in the graph
        let (path_weights, predecessors) =
            bellman_ford(hops_graph, self.router_id).expect("hop-count graph has no negative edges");
        let mut paths: Vec<(NodeId, f64, Option<NodeId>)> = path_weights
            .into_iter()
            .zip(predecessors.into_iter())
            .enumerate()
            .map(|(i, (w, p))| ((i as u32).into(), w, p))
            .collect();
        paths.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        for (node, cost, predecessor) in paths {
            if cost.is_infinite() {
                self.unicast_forwarding_table.insert(node, None);
                continue;
            }
            let next_hop = if let Some(predecessor) = predecessor {
                // the predecessor is already in the table, because we sorted by cost
                if predecessor == self.router_id {
                    node
                } else {
                    self.unicast_forwarding_table
                        .get(&predecessor)
                        .unwrap() // first unwrap for get, which returns an option
                        .unwrap() // second unwrap: the route must exist
                        .0
                }
            } else {
                node
            };
            self.unicast_forwarding_table.insert(node, Some((next_hop, cost as u32)));
        }
    }

    /// Handle a packet arriving over `link` and enqueue any resulting
    /// transmissions.
    pub(crate) fn handle_packet(
        &mut self,
        link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        match (&packet.dst, &packet.kind) {
            (Address::Node(dst), PacketKind::ServerLoad(_)) if *dst == self.router_id => {
                self.server_load_packet(link, packet, queue, config)
            }
            (Address::Node(dst), _) if *dst == self.router_id => {
                // packet for me, but not a ServerLoad: consume it
                info!(
                    "{:.3}: RECV PACKET '{}' {}.{} consumed after {:.3}",
                    queue.now(),
                    self.name,
                    packet.src.index(),
                    packet.seq,
                    queue.now() - packet.time
                );
                Ok(())
            }
            (Address::Service(_), PacketKind::ClientRequest) => {
                self.client_request_packet(link, packet, queue)
            }
            (Address::Service(service), _) => {
                warn!(
                    "{:.3}: RECV PACKET '{}' unexpected non-request packet for service {}, dropped",
                    queue.now(),
                    self.name,
                    service
                );
                Ok(())
            }
            (Address::Node(_), _) => self.normal_forwarding_packet(link, packet, queue),
        }
    }

    /// The process for a packet with a ServerLoad payload.
    fn server_load_packet(
        &mut self,
        link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        let now = queue.now();
        let (service, replica, operation, mut payload) = match packet.kind {
            PacketKind::ServerLoad(ServerLoad { service, replica, operation, payload }) => {
                (service, replica, operation, payload)
            }
            _ => unreachable!("caller checked the packet kind"),
        };

        info!(
            "{:.3}: RECV PACKET '{}' ServerLoad {}.{} ({:.3}) [{}] managed after {:.3}",
            now,
            self.name,
            packet.src.index(),
            packet.seq,
            packet.time,
            replica.index(),
            now - packet.time
        );

        // add the delay of the last hop to the metrics
        payload.delay += link.propagation_delay;

        // announcements must travel the reverse unicast tree rooted at the
        // replica, otherwise the sent-table bookkeeping is not safe
        let valid_route = match self.unicast_forwarding_table.get(&replica) {
            Some(Some((next_hop, _))) => *next_hop == link.src,
            _ => false,
        };
        debug!(
            "{:.3}: UNICAST_ROUTE '{}' for {} from {} --> {}",
            now,
            self.name,
            replica.index(),
            link.src.index(),
            if valid_route { "VALID" } else { "RETURN" }
        );
        if !valid_route {
            return Ok(());
        }

        match operation {
            LoadOperation::Announce => {
                if !self.process_announce(
                    link,
                    service,
                    replica,
                    packet.seq,
                    packet.time,
                    payload,
                    queue,
                    config,
                ) {
                    return Ok(());
                }
            }
            LoadOperation::Withdraw => self.process_withdraw(link, replica, queue),
        }

        // the RIB changed, so the forwarding choice may change as well
        self.choose_best_replica(queue.now(), config);
        Ok(())
    }

    /// Process an Announce: upsert the RIB row for the replica, then run the
    /// announcement decision and dispatch the delta against the sent table.
    /// Returns false if the update was dropped as stale.
    #[allow(clippy::too_many_arguments)]
    fn process_announce(
        &mut self,
        link: LinkEnd,
        service: ServiceId,
        replica: NodeId,
        msg_id: usize,
        creation_time: SimTime,
        payload: LoadPayload,
        queue: &mut EventQueue,
        config: &Config,
    ) -> bool {
        let now = queue.now();

        // a row which must be re-evaluated even if the decision phase would
        // not otherwise re-emit it
        let mut marked: Option<DocId> = None;

        match self.rib.find_replica(replica) {
            None => {
                // nothing found, it must be new, so add it
                let doc_id = self.rib.insert(RibEntry {
                    replica,
                    neighbour: link.src,
                    link,
                    msg_id,
                    service: service.clone(),
                    creation_time,
                    load: payload.load,
                    no_of_flows: payload.no_of_flows,
                    delay: payload.delay,
                    slots: payload.slots,
                });
                info!("{:.3}: ADD METRIC '{}' metric no {}", now, self.name, doc_id);
            }
            Some((doc_id, row)) => {
                if row.creation_time > creation_time {
                    // out-of-order older update
                    debug!(
                        "{:.3}: METRIC_TOO_OLD '{}' replica: {} msgID: {}",
                        now,
                        self.name,
                        replica.index(),
                        msg_id
                    );
                    return false;
                }
                // neighbors recorded in the sent table still hold the old
                // values, so any change to the row must be re-propagated.
                // Only a byte-identical update is suppressed.
                if payload_compare(&payload, row, &config.metrics) != Compare::Same
                    && self.sent_table.docs().contains(&doc_id)
                {
                    marked = Some(doc_id);
                    info!("{:.3}: FORCE_ANNOUNCE '{}' with {}", now, self.name, doc_id);
                }
                let row = self.rib.get_mut(doc_id).unwrap();
                row.neighbour = link.src;
                row.link = link;
                row.msg_id = msg_id;
                row.creation_time = creation_time;
                row.load = payload.load;
                row.no_of_flows = payload.no_of_flows;
                row.delay = payload.delay;
                row.slots = payload.slots;
                info!(
                    "{:.3}: UPDATE METRIC '{}' metric no {} msgID: {} creationTime: {:.3} load: {} delay: {}",
                    now, self.name, doc_id, msg_id, creation_time, payload.load, payload.delay
                );
            }
        }

        self.log_metric_table(now, config);

        // announcement decision over the rows of this service
        let rows: Vec<(DocId, &RibEntry)> = self.rib.service_rows(&service).collect();
        let announce_set = decide_announcements(&rows, &config.metrics);

        info!(
            "{:.3}: ANNOUNCE '{}' : {} / [{}]",
            now,
            self.name,
            announce_set.len(),
            announce_set.iter().join(", ")
        );

        // delta against the sent table
        let sent_docs = self.sent_table.docs();
        let to_announce: Vec<DocId> = announce_set
            .iter()
            .copied()
            .filter(|d| !sent_docs.contains(d) || marked == Some(*d))
            .collect();
        let to_withdraw: Vec<DocId> = sent_docs
            .iter()
            .copied()
            .filter(|d| {
                !announce_set.contains(d)
                    && self.rib.get(*d).map_or(false, |e| e.service == service)
            })
            .collect();

        // idempotence is broken exactly for the marked row: clear its pairs
        // so the announcement is actually re-sent.
        //
        // NOTE: a Withdraw for the marked replica which is still in flight
        // at this moment can race with the re-announcement; see the protocol
        // notes in DESIGN.md.
        if let Some(doc_id) = marked {
            if announce_set.contains(&doc_id) {
                self.sent_table.remove_doc(doc_id);
            }
        }

        for doc_id in to_announce {
            self.dispatch_announce(doc_id, queue);
        }
        for doc_id in to_withdraw {
            self.dispatch_withdraw(doc_id, WithdrawReason::ParetoDrop, None, queue);
        }
        debug!("{:.3}: ANNOUNCE_END '{}'", queue.now(), self.name);
        true
    }

    /// Process a received Withdraw: forward it along the previously
    /// announced neighbors and delete the row.
    fn process_withdraw(&mut self, link: LinkEnd, replica: NodeId, queue: &mut EventQueue) {
        let doc_id = match self.rib.find_replica(replica) {
            Some((doc_id, _)) => doc_id,
            None => return,
        };
        self.dispatch_withdraw(doc_id, WithdrawReason::Received, Some(link.src), queue);
    }

    /// Send an Announce for the row to every neighbor which has not yet
    /// received it, and record the transmissions in the sent table.
    fn dispatch_announce(&mut self, doc_id: DocId, queue: &mut EventQueue) {
        let row = match self.rib.get(doc_id) {
            Some(row) => row.clone(),
            None => return,
        };
        for i in 0..self.ports.len() {
            let neighbour = self.ports[i].neighbour();
            if row.neighbour == neighbour {
                // don't send to where it came from
                debug!(
                    "{:.3}: NO RETURN from '{}' to {} - metric no {}",
                    queue.now(),
                    self.name,
                    neighbour.index(),
                    doc_id
                );
                continue;
            }
            if self.ports[i].far_kind().is_host() {
                // don't send to any connected hosts
                continue;
            }
            if self.sent_table.contains(doc_id, neighbour) {
                // this is in the sent table, so no need to send
                debug!(
                    "{:.3}: ALREADY IN SENT_TABLE '{}' --> {} - metric no {} msgID {}",
                    queue.now(),
                    self.name,
                    neighbour.index(),
                    doc_id,
                    row.msg_id
                );
                continue;
            }
            let packet = self.load_packet(&row, neighbour, LoadOperation::Announce);
            info!(
                "{:.3}: FORWARD METRIC {} from '{}' to {}",
                queue.now(),
                doc_id,
                self.name,
                neighbour.index()
            );
            self.ports[i].enqueue(packet, queue);
            self.sent_table.insert(doc_id, neighbour);
            info!(
                "{:.3}: SENT_TABLE '{}' add metric no {} neighbour {}",
                queue.now(),
                self.name,
                doc_id,
                neighbour.index()
            );
        }
    }

    /// Send a Withdraw for the row to every neighbor it was announced to,
    /// and clear the corresponding sent-table entries. The row itself is
    /// deleted only if the withdraw was received from upstream; a row which
    /// merely fell out of the announce-set stays in the RIB so it can return
    /// later.
    fn dispatch_withdraw(
        &mut self,
        doc_id: DocId,
        reason: WithdrawReason,
        arrival: Option<NodeId>,
        queue: &mut EventQueue,
    ) {
        let row = match self.rib.get(doc_id) {
            Some(row) => row.clone(),
            None => return,
        };
        for i in 0..self.ports.len() {
            let neighbour = self.ports[i].neighbour();
            if arrival == Some(neighbour) || row.neighbour == neighbour {
                continue;
            }
            if self.ports[i].far_kind().is_host() {
                continue;
            }
            if !self.sent_table.contains(doc_id, neighbour) {
                // never announced there, nothing to take back
                continue;
            }
            let packet = self.load_packet(&row, neighbour, LoadOperation::Withdraw);
            info!(
                "{:.3}: FORWARD WITHDRAW {} from '{}' to {}",
                queue.now(),
                doc_id,
                self.name,
                neighbour.index()
            );
            self.ports[i].enqueue(packet, queue);
            self.sent_table.remove(doc_id, neighbour);
        }
        // defensive cleanup of any leftover pairs
        self.sent_table.remove_doc(doc_id);
        if reason == WithdrawReason::Received {
            self.rib.remove(doc_id);
        }
    }

    /// Build a replica-state packet from a RIB row, addressed to a neighbor.
    fn load_packet(&self, row: &RibEntry, neighbour: NodeId, operation: LoadOperation) -> Packet {
        Packet {
            time: row.creation_time,
            size: SERVER_LOAD_PACKET_SIZE,
            seq: row.msg_id,
            src: self.router_id,
            dst: Address::Node(neighbour),
            flow_id: 0,
            kind: PacketKind::ServerLoad(ServerLoad {
                service: row.service.clone(),
                replica: row.replica,
                operation,
                payload: LoadPayload {
                    load: row.load,
                    no_of_flows: row.no_of_flows,
                    delay: row.delay,
                    slots: row.slots,
                },
            }),
        }
    }

    /// Recompute the service forwarding table: for every service, pick the
    /// RIB row with the smallest utility. The table entry is only swapped
    /// when the utility improves by at least the damping factor.
    fn choose_best_replica(&mut self, now: SimTime, config: &Config) {
        // services currently known, from the RIB and from earlier selections
        let mut services: Vec<ServiceId> =
            self.rib.iter().map(|(_, e)| e.service.clone()).collect();
        services.extend(self.best.keys().cloned());
        services.sort();
        services.dedup();

        for service in services {
            let candidates: Vec<(DocId, f64, NodeId, NodeId)> = self
                .rib
                .service_rows(&service)
                .map(|(d, e)| {
                    let u =
                        (config.forwarding_utility_fn)(config.alpha, e.load as f64, e.delay);
                    (d, u, e.replica, e.neighbour)
                })
                .collect();

            if candidates.is_empty() {
                // the last replica of the service was withdrawn: the entry
                // must not point at a stale neighbor
                self.best.remove(&service);
                if self.service_forwarding_table.remove(&service).is_some() {
                    info!(
                        "{:.3}: SERVICE_FORWARDING_TABLE '{}' {} removed",
                        now, self.name, service
                    );
                }
                continue;
            }

            info!(
                "{:.3}: UTILITY '{}' = [{}]",
                now,
                self.name,
                candidates
                    .iter()
                    .map(|(d, u, r, n)| format!(
                        "metric: {} utility: {:.4} replica: {} neighbour: {}",
                        d,
                        u,
                        r.index(),
                        n.index()
                    ))
                    .join(" | ")
            );

            // the first candidate wins on equal utility
            let mut best_utility = f64::INFINITY;
            let mut best_choice: Option<(NodeId, NodeId)> = None;
            for (_, u, replica, neighbour) in &candidates {
                if *u < best_utility {
                    best_utility = *u;
                    best_choice = Some((*replica, *neighbour));
                }
            }
            let (replica, neighbour) = best_choice.unwrap();

            debug!(
                "{:.3}: CHOOSE_BEST_REPLICA '{}' {} candidate {} via {} utility {:.4}",
                now,
                self.name,
                service,
                replica.index(),
                neighbour.index(),
                best_utility
            );

            // the stored utility only counts while its replica is still a
            // candidate; once the selected replica is withdrawn the entry is
            // stale and damping must not keep pointing at it
            let old_utility = match self.best.get(&service) {
                Some(b) if candidates.iter().any(|(_, _, replica, _)| *replica == b.replica) => {
                    b.utility
                }
                _ => f64::INFINITY,
            };
            let diff = round4((best_utility - old_utility).abs());
            if diff == 0.0 {
                // ties do not flip the current selection
                continue;
            }
            if diff < config.forwarding_utility_change_factor {
                // damping: the improvement is too small to swap
                debug!(
                    "{:.3}: BEST_REPLICA '{}' {} damped, diff {:.4} < {:.4}",
                    now, self.name, service, diff, config.forwarding_utility_change_factor
                );
                continue;
            }

            info!(
                "{:.3}: BEST_REPLICA '{}' {} -> {}",
                now,
                self.name,
                replica.index(),
                neighbour.index()
            );
            self.best
                .insert(service.clone(), BestReplica { replica, neighbour, utility: best_utility });
            self.service_forwarding_table.insert(service.clone(), neighbour);
            info!(
                "{:.3}: SERVICE_FORWARDING_TABLE '{}' {} -> {}",
                now,
                self.name,
                service,
                neighbour.index()
            );
        }
    }

    /// A client has sent a request: forward it along the service forwarding
    /// table.
    fn client_request_packet(
        &mut self,
        _link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let service = packet.dst.service().cloned().expect("caller checked the address");
        info!(
            "{:.3}: RECV PACKET ClientRequest '{}' for service {} pkt: {}",
            queue.now(),
            self.name,
            service,
            packet.seq
        );
        match self.service_forwarding_table.get(&service).copied() {
            None => {
                warn!(
                    "{:.3}: NO SERVICE_FORWARDING_TABLE ENTRY ClientRequest '{}' for service {} pkt: {}",
                    queue.now(),
                    self.name,
                    service,
                    packet.seq
                );
                Ok(())
            }
            Some(neighbour) => {
                let idx =
                    self.port_index(neighbour).ok_or(DeviceError::NoPortTo(neighbour))?;
                info!(
                    "{:.3}: FORWARD PACKET ClientRequest '{}' for service {} pkt: {} send to neighbour {}",
                    queue.now(),
                    self.name,
                    service,
                    packet.seq,
                    neighbour.index()
                );
                self.ports[idx].enqueue(packet, queue);
                Ok(())
            }
        }
    }

    /// Unicast forwarding along the precomputed table. Never send a packet
    /// back over the link it arrived on, and never into a host unless the
    /// host is the destination.
    fn normal_forwarding_packet(
        &mut self,
        link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let dst = packet.dst.node().expect("caller checked the address");
        let next_hop = match self.unicast_forwarding_table.get(&dst) {
            Some(Some((next_hop, _))) => *next_hop,
            _ => {
                warn!(
                    "{:.3}: PACKET {}.{} for {:?} has no route at '{}', dropped",
                    queue.now(),
                    packet.src.index(),
                    packet.seq,
                    dst,
                    self.name
                );
                return Ok(());
            }
        };
        if next_hop == link.src {
            debug!(
                "{:.3}: PACKET {}.{} dont send back from '{}' to {}",
                queue.now(),
                packet.src.index(),
                packet.seq,
                self.name,
                link.src.index()
            );
            return Ok(());
        }
        let idx = self.port_index(next_hop).ok_or(DeviceError::NoPortTo(next_hop))?;
        if self.ports[idx].far_kind().is_host() && next_hop != dst {
            debug!(
                "{:.3}: PACKET {}.{} dont send to host from '{}' to {}",
                queue.now(),
                packet.src.index(),
                packet.seq,
                self.name,
                next_hop.index()
            );
            return Ok(());
        }
        info!(
            "{:.3}: PACKET {}.{} for {} forwarded from '{}' to {} after {:.3}",
            queue.now(),
            packet.src.index(),
            packet.seq,
            dst.index(),
            self.name,
            next_hop.index(),
            queue.now() - packet.time
        );
        self.ports[idx].enqueue(packet, queue);
        Ok(())
    }

    fn log_metric_table(&self, now: SimTime, config: &Config) {
        if !log_enabled!(Level::Info) {
            return;
        }
        if config.table_format {
            info!("{:.3}: METRIC_TABLE '{}'", now, self.name);
            for (i, (doc_id, row)) in self.rib.iter().enumerate() {
                info!("       {:2}  [{}] {:?}", i + 1, doc_id, row);
            }
        } else {
            info!(
                "{:.3}: METRIC_TABLE '{}' [{}]",
                now,
                self.name,
                self.rib.iter().map(|(d, e)| format!("[{}] {:?}", d, e)).join(", ")
            );
        }
    }
}

/// Round to 4 decimals, as used by the damping comparison.
fn round4(val: f64) -> f64 {
    (val * 10_000.0).round() / 10_000.0
}

/// Compare entry `j` against entry `i` over the metric list: `Better` means
/// better-or-equal on every metric and strictly better on at least one,
/// `Same` means equal on all.
fn compare_metrics(j: &RibEntry, i: &RibEntry, metrics: &[Metric]) -> Compare {
    compare_values(
        |kind| j.metric(kind),
        |kind| i.metric(kind),
        metrics,
    )
}

/// Compare an incoming payload against an existing RIB row.
fn payload_compare(payload: &LoadPayload, row: &RibEntry, metrics: &[Metric]) -> Compare {
    compare_values(
        |kind| match kind {
            crate::config::MetricKind::Load => payload.load as f64,
            crate::config::MetricKind::Delay => payload.delay,
        },
        |kind| row.metric(kind),
        metrics,
    )
}

fn compare_values(
    j: impl Fn(crate::config::MetricKind) -> f64,
    i: impl Fn(crate::config::MetricKind) -> f64,
    metrics: &[Metric],
) -> Compare {
    let mut all_same = true;
    for m in metrics {
        let (vj, vi) = (j(m.kind), i(m.kind));
        if vj == vi {
            continue;
        }
        all_same = false;
        if !(m.better)(vj, vi) {
            return Compare::Worse;
        }
    }
    if all_same {
        Compare::Same
    } else {
        Compare::Better
    }
}

/// The announcement decision: the Pareto-maximal subset of the given rows.
/// A row is kept if no other row strictly dominates it; of rows equal on
/// every metric only the first (lowest row id) is kept.
fn decide_announcements(rows: &[(DocId, &RibEntry)], metrics: &[Metric]) -> Vec<DocId> {
    if rows.len() == 1 {
        return vec![rows[0].0];
    }
    let mut keep = vec![true; rows.len()];
    for i in 0..rows.len() {
        for j in 0..rows.len() {
            if i == j {
                continue;
            }
            match compare_metrics(rows[j].1, rows[i].1, metrics) {
                Compare::Better => {
                    keep[i] = false;
                    break;
                }
                Compare::Same if j < i => {
                    keep[i] = false;
                    break;
                }
                _ => {}
            }
        }
    }
    rows.iter().zip(keep).filter(|(_, k)| *k).map(|((d, _), _)| *d).collect()
}
