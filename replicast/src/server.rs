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

//! # Server (replica)
//!
//! A server provides one service. It tracks the load and flow count caused
//! by background traffic and by admitted client requests, rejects requests
//! when all slots are taken, and announces its state upstream whenever the
//! relative change crosses the configured threshold. Announcements are
//! aligned to integer ticks, with at most one announcement per tick.

use crate::config::Config;
use crate::event::{Event, EventQueue};
use crate::link::{LinkEnd, SwitchPort};
use crate::packet::{
    LoadOperation, LoadPayload, Packet, PacketKind, ServerLoad, SERVER_LOAD_PACKET_SIZE,
};
use crate::types::{Address, DeviceError, NodeId, ServiceId, SimTime};
use log::*;

/// The details of an admitted client request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The requesting client
    pub src: NodeId,
    /// The requested service
    pub dst: ServiceId,
    /// Sequence number at the client
    pub seq: usize,
    /// Requested service time units
    pub size: u64,
}

/// Background load contribution, fed by load events.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LoadInfo {
    load: u32,
    no_of_flows: u32,
}

/// A server host providing one service.
#[derive(Debug, Clone)]
pub struct Server {
    name: String,
    node_id: NodeId,
    service: ServiceId,
    /// The single upstream port; a server has degree 1
    port: Option<SwitchPort>,
    /// Admission capacity
    slots: u32,
    /// Load caused by admitted requests
    load: u32,
    /// Flows caused by admitted requests
    no_of_flows: u32,
    /// Contribution of the last background load event
    last_event_info: LoadInfo,
    /// The most recently announced values
    last_payload: LoadPayload,
    /// Sequence number for outgoing packets
    pkt_no: usize,
    /// A deferred announcement is already scheduled
    pending_announce: bool,
    /// The last integer tick an announcement went out on
    last_announce_tick: Option<u64>,
}

impl Server {
    pub(crate) fn new(name: String, node_id: NodeId, service: ServiceId, slots: u32) -> Self {
        Self {
            name,
            node_id,
            service,
            port: None,
            slots,
            load: 0,
            no_of_flows: 0,
            last_event_info: LoadInfo::default(),
            last_payload: LoadPayload { load: 0, no_of_flows: 0, delay: 0.0, slots },
            pkt_no: 1,
            pending_announce: false,
            last_announce_tick: None,
        }
    }

    /// Return the id of the server.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Return the name of the server.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// The service this replica provides.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// The admission capacity.
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Override the admission capacity. Only sensible before the run starts.
    pub fn set_slots(&mut self, slots: u32) {
        self.slots = slots;
        self.last_payload.slots = slots;
    }

    /// The total load: background contribution plus admitted requests.
    pub fn calculate_load(&self) -> u32 {
        self.last_event_info.load + self.load
    }

    /// The total flow count: background contribution plus admitted requests.
    pub fn calculate_flows(&self) -> u32 {
        self.last_event_info.no_of_flows + self.no_of_flows
    }

    /// The slots still available.
    pub fn calculate_slots(&self) -> u32 {
        self.slots.saturating_sub(self.calculate_flows())
    }

    /// The upstream neighbor, once attached.
    pub fn neighbour(&self) -> Option<NodeId> {
        self.port.as_ref().map(|p| p.neighbour())
    }

    /// Number of packets this server has sent so far.
    pub fn packets_sent(&self) -> usize {
        self.pkt_no - 1
    }

    /// The values of the most recent announcement.
    pub fn last_payload(&self) -> &LoadPayload {
        &self.last_payload
    }

    pub(crate) fn attach(&mut self, port: SwitchPort) -> Result<(), DeviceError> {
        match self.port {
            Some(_) => Err(DeviceError::NoPortTo(port.neighbour())),
            None => {
                self.port = Some(port);
                Ok(())
            }
        }
    }

    pub(crate) fn has_port(&self) -> bool {
        self.port.is_some()
    }

    pub(crate) fn port_pull(&mut self, queue: &mut EventQueue) -> Result<(), DeviceError> {
        self.port
            .as_mut()
            .ok_or(DeviceError::HostNotAttached(self.node_id))?
            .pull(queue);
        Ok(())
    }

    /// Handle a packet delivered over the upstream link.
    pub(crate) fn handle_packet(
        &mut self,
        _link: LinkEnd,
        packet: Packet,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        match (&packet.dst, &packet.kind) {
            (Address::Service(service), PacketKind::ClientRequest) if *service == self.service => {
                info!(
                    "{:.3}: SERVER_PROCESS '{}' ClientRequest for service {} pkt: {}.{}",
                    queue.now(),
                    self.name,
                    service,
                    packet.src.index(),
                    packet.seq
                );
                let request = Request {
                    src: packet.src,
                    dst: service.clone(),
                    seq: packet.seq,
                    size: packet.size,
                };
                self.increase_load(request, queue, config)
            }
            (Address::Node(dst), _) if *dst == self.node_id => {
                info!(
                    "{:.3}: HOST Packet {}.{} consumed in '{}' after {:.3}",
                    queue.now(),
                    packet.src.index(),
                    packet.seq,
                    self.name,
                    queue.now() - packet.time
                );
                Ok(())
            }
            _ => {
                warn!(
                    "{:.3}: HOST Packet {}.{} not for '{}', dropped",
                    queue.now(),
                    packet.src.index(),
                    packet.seq,
                    self.name
                );
                Ok(())
            }
        }
    }

    /// Admit a client request, or reject it when no slot is free. An
    /// admitted request schedules its own release after the service time.
    fn increase_load(
        &mut self,
        request: Request,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        let service_time = (config.size_to_time)(request.size);
        if self.calculate_slots() == 0 {
            // there is no more capacity to take a job
            info!(
                "{:.3}: NO_MORE CAPACITY {} timeout {} for {}.{}",
                queue.now(),
                self.name,
                service_time,
                request.src.index(),
                request.seq
            );
            return Ok(());
        }
        self.load = (config.load_up_fn)(self.load);
        self.no_of_flows = (config.flows_up_fn)(self.no_of_flows);
        info!(
            "{:.3}: INCREASE_LOAD '{}' request {}.{} timeout {} load: {} no_of_flows: {} capacity: {}",
            queue.now(),
            self.name,
            request.src.index(),
            request.seq,
            service_time,
            self.load,
            self.no_of_flows,
            self.calculate_slots()
        );
        let service = request.dst.clone();
        queue.push_after(
            service_time,
            Event::FlowComplete { server: self.node_id, request },
        );
        self.send_load_change(queue.now(), service, queue, config)
    }

    /// Release an admitted request once its service time is over.
    pub(crate) fn decrease_load(
        &mut self,
        request: Request,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        self.load = (config.load_down_fn)(self.load);
        self.no_of_flows = (config.flows_down_fn)(self.no_of_flows);
        info!(
            "{:.3}: DECREASE_LOAD '{}' request {}.{} after {} load: {} no_of_flows: {} capacity: {}",
            queue.now(),
            self.name,
            request.src.index(),
            request.seq,
            (config.size_to_time)(request.size),
            self.load,
            self.no_of_flows,
            self.calculate_slots()
        );
        self.send_load_change(queue.now(), request.dst, queue, config)
    }

    /// Background load changed: replace the contribution and run the
    /// announcement gate if any value actually changed.
    pub(crate) fn process_load_change(
        &mut self,
        service: ServiceId,
        load: u32,
        no_of_flows: u32,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        let new_info = LoadInfo { load, no_of_flows };
        if new_info == self.last_event_info {
            return Ok(());
        }
        self.last_event_info = new_info;
        self.send_load_change(queue.now(), service, queue, config)
    }

    /// The announcement gate: announce only when the relative flow change
    /// since the last announcement crosses the threshold, aligned to
    /// integer ticks.
    fn send_load_change(
        &mut self,
        now: SimTime,
        service: ServiceId,
        queue: &mut EventQueue,
        config: &Config,
    ) -> Result<(), DeviceError> {
        if self.slots == 0 {
            return Ok(());
        }
        let diff = self.calculate_load_difference();
        debug!(
            "{:.3}: CALCULATE_LOAD_DIFFERENCE '{}' change = {}",
            now, self.name, diff
        );
        if diff == 0.0 {
            return Ok(());
        }
        if diff < config.change_factor {
            // change is too small, do nothing
            return Ok(());
        }
        if now == now.floor() {
            // on a tick boundary, send right away
            self.send_load_packet(now, service, queue)
        } else {
            // wait for the next tick boundary
            if !self.pending_announce {
                self.pending_announce = true;
                queue.push_at(
                    now.ceil(),
                    Event::SendLoad { server: self.node_id, service },
                );
            }
            Ok(())
        }
    }

    /// Relative flow change since the last announced payload, rounded to
    /// three decimals.
    fn calculate_load_difference(&self) -> f64 {
        let last = self.last_payload.no_of_flows as f64 / self.slots as f64;
        let current = self.calculate_flows() as f64 / self.slots as f64;
        ((last - current).abs() * 1000.0).round() / 1000.0
    }

    /// A deferred announcement fired.
    pub(crate) fn process_send_load(
        &mut self,
        service: ServiceId,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        self.pending_announce = false;
        self.send_load_packet(queue.now(), service, queue)
    }

    /// Send a ServerLoad packet announcing the current state. At most one
    /// announcement goes out per integer tick.
    pub(crate) fn send_load_packet(
        &mut self,
        time: SimTime,
        service: ServiceId,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let tick = time.floor() as u64;
        if self.last_announce_tick == Some(tick) {
            debug!(
                "{:.3}: SEND_LOAD '{}' already announced on tick {}",
                queue.now(),
                self.name,
                tick
            );
            return Ok(());
        }
        let payload = self.calculate_payload();
        debug!(
            "{:.3}: CALCULATE_PAYLOAD '{}' slots = {} flows = {} load = {}",
            queue.now(),
            self.name,
            payload.slots,
            payload.no_of_flows,
            payload.load
        );
        self.last_payload = payload;
        self.last_announce_tick = Some(tick);
        self.emit(time, service, LoadOperation::Announce, payload, queue)
    }

    /// Send a Withdraw for this replica. There is no autonomous code path
    /// leading here; withdrawal is a scripted driver action.
    pub(crate) fn send_withdraw_packet(
        &mut self,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let payload = self.calculate_payload();
        let service = self.service.clone();
        self.emit(queue.now(), service, LoadOperation::Withdraw, payload, queue)
    }

    fn emit(
        &mut self,
        time: SimTime,
        service: ServiceId,
        operation: LoadOperation,
        payload: LoadPayload,
        queue: &mut EventQueue,
    ) -> Result<(), DeviceError> {
        let port = self
            .port
            .as_mut()
            .ok_or(DeviceError::HostNotAttached(self.node_id))?;
        let packet = Packet {
            time,
            size: SERVER_LOAD_PACKET_SIZE,
            seq: self.pkt_no,
            src: self.node_id,
            dst: Address::Node(port.neighbour()),
            flow_id: 0,
            kind: PacketKind::ServerLoad(ServerLoad {
                service,
                replica: self.node_id,
                operation,
                payload,
            }),
        };
        self.pkt_no += 1;
        port.enqueue(packet, queue);
        Ok(())
    }

    fn calculate_payload(&self) -> LoadPayload {
        LoadPayload {
            load: self.calculate_load(),
            no_of_flows: self.calculate_flows(),
            delay: 0.0,
            slots: self.calculate_slots(),
        }
    }
}
