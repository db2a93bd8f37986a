//! Mesh engine: the single-writer state object
//!
//! Owns every table and drives the reception pipeline:
//! 1. Window update and duplicate detection on the originator entry
//! 2. Link-quality estimation towards the link-layer sender
//! 3. Route ranking on non-duplicate bidirectional receptions
//! 4. Relay decision into the forwarding scheduler
//!
//! Periodic work (own broadcasts, maintenance sweep) happens in [`MeshEngine::poll`].
//! The engine never blocks and never performs I/O itself: outgoing packets and
//! local deliveries are queued as [`Action`]s for the caller to carry out.

use super::address::{IfaceId, LinkAddr, LocalInterface};
use super::announce::{HostAnnouncementTable, Owner};
use super::gateway::{choose_gateway, GatewayList};
use super::neighbor::NeighborKey;
use super::originator::ReachabilityTable;
use super::quality::LinkQualityEstimator;
use super::route::{self, RouteChange, RouteObserver};
use super::scheduler::{fan_out, ForwardingScheduler, ForwardingTask, RelayRequest};
use super::window::{seq_diff, WINDOW_SIZE};
use crate::config::EngineConfig;
use crate::wire::packet::{decode_announcements, encode_announcements};
use crate::wire::{
    BroadcastDataPacket, EthernetHeader, MeshPacket, RoutingPacket, UnicastDataPacket, WireError,
};
use crate::MeshError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// A packet to put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub iface: IfaceId,
    pub dest: LinkAddr,
    pub payload: Vec<u8>,
}

/// Work produced by the engine for the I/O layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Transmit(Transmission),
    /// Hand a bridged frame to the local virtual interface
    Deliver(Vec<u8>),
}

/// Why an inbound packet or frame was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    IncompatibleVersion,
    UnknownInterface,
    /// Link-layer sender is one of our interfaces
    OwnSender,
    BroadcastSender,
    /// Our own broadcast relayed back to us
    OwnBroadcastEcho,
    Unidirectional,
    /// Data flooded by ourselves
    OwnOriginator,
    UnknownOriginator,
    Duplicate,
    TtlExceeded,
    NoRoute,
    /// Destination is bridged by this node
    LocalHost,
}

/// Result of processing one bridged or data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Unicast sent towards the next hop
    Sent,
    /// Broadcast sent on every interface
    Flooded,
    /// Handed to the local virtual interface
    Delivered,
    /// Unicast relayed along the installed route
    Forwarded,
    Dropped(DropReason),
}

/// Result of processing one inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Routing {
        duplicate: bool,
        bidirectional: bool,
        relayed: bool,
    },
    /// Older sequence number recorded in the windows only
    Late,
    Data(FrameOutcome),
    Dropped(DropReason),
}

/// Table sizes for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub originators: usize,
    pub routed_originators: usize,
    pub neighbors: usize,
    pub queued_tasks: usize,
    pub announced_hosts: usize,
    pub local_hosts: usize,
    pub gateways: usize,
}

pub struct MeshEngine {
    config: EngineConfig,
    interfaces: Vec<LocalInterface>,
    next_seqno: Vec<u16>,
    last_sent_seqno: Vec<Option<u16>>,
    bcast_seqno: u16,
    reach: ReachabilityTable,
    hna: HostAnnouncementTable,
    gateways: GatewayList,
    scheduler: ForwardingScheduler,
    estimator: LinkQualityEstimator,
    observer: Arc<dyn RouteObserver>,
    next_sweep: Option<u64>,
    actions: Vec<Action>,
}

impl MeshEngine {
    /// Build the engine. Interface ids must be dense, in order, starting at 0.
    pub fn new(
        config: EngineConfig,
        interfaces: Vec<LocalInterface>,
        observer: Arc<dyn RouteObserver>,
    ) -> Result<Self, MeshError> {
        config.validate()?;

        if interfaces.is_empty() {
            return Err(MeshError::NoInterfaces);
        }
        for (pos, local) in interfaces.iter().enumerate() {
            if local.id.index() != pos {
                return Err(MeshError::InterfaceIndex {
                    name: local.name.clone(),
                    expected: pos,
                    got: local.id.index(),
                });
            }
        }

        let reach = ReachabilityTable::new(interfaces.len()).map_err(|e| {
            error!("Can't allocate originator table: {}", e);
            MeshError::Allocation(e.to_string())
        })?;

        let count = interfaces.len();
        Ok(Self {
            hna: HostAnnouncementTable::new(
                config.max_packet_size,
                interfaces.iter().map(|local| local.addr),
            ),
            gateways: GatewayList::new(),
            scheduler: ForwardingScheduler::new(&config),
            estimator: LinkQualityEstimator::new(&config),
            next_seqno: vec![1; count],
            last_sent_seqno: vec![None; count],
            bcast_seqno: 0,
            reach,
            interfaces,
            observer,
            next_sweep: None,
            actions: Vec::new(),
            config,
        })
    }

    /// Schedule the first own broadcast on every interface and arm the sweep
    pub fn start(&mut self, now: u64) {
        for i in 0..self.interfaces.len() {
            let local = &self.interfaces[i];
            info!("Using interface {} ({}) with address {}", local.name, local.id, local.addr);
            self.schedule_own(IfaceId(i as u16), now);
        }
        self.next_sweep = Some(now.saturating_add(self.config.sweep_interval_ms));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn interfaces(&self) -> &[LocalInterface] {
        &self.interfaces
    }

    /// Address used as originator of flooded data
    pub fn primary_address(&self) -> LinkAddr {
        self.interfaces[0].addr
    }

    pub fn reachability(&self) -> &ReachabilityTable {
        &self.reach
    }

    pub fn announcements(&self) -> &HostAnnouncementTable {
        &self.hna
    }

    pub fn gateways(&self) -> &GatewayList {
        &self.gateways
    }

    pub fn scheduler(&self) -> &ForwardingScheduler {
        &self.scheduler
    }

    pub fn is_my_addr(&self, addr: &LinkAddr) -> bool {
        self.interfaces.iter().any(|l| l.addr == *addr)
    }

    /// Earliest time `poll` has work to do
    pub fn next_deadline(&self) -> Option<u64> {
        match (self.scheduler.next_due(), self.next_sweep) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take every action produced since the last call
    pub fn drain_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    // ========================================================================
    // RECEPTION
    // ========================================================================

    /// Process one raw packet received from `sender` on `iface`
    pub fn handle_packet(
        &mut self,
        payload: &[u8],
        sender: LinkAddr,
        iface: IfaceId,
        now: u64,
    ) -> PacketOutcome {
        if self.interfaces.get(iface.index()).is_none() {
            debug!("Drop packet: unknown interface {}", iface);
            return PacketOutcome::Dropped(DropReason::UnknownInterface);
        }

        let packet = match MeshPacket::decode(payload) {
            Ok(packet) => packet,
            Err(WireError::InvalidVersion(version)) => {
                debug!("Drop packet: incompatible version {} from {}", version, sender);
                return PacketOutcome::Dropped(DropReason::IncompatibleVersion);
            }
            Err(e) => {
                debug!("Drop packet from {}: {}", sender, e);
                return PacketOutcome::Dropped(DropReason::Malformed);
            }
        };

        match packet {
            MeshPacket::Routing(packet) => self.handle_routing_packet(packet, sender, iface, now),
            MeshPacket::Unicast(packet) => {
                if let Some(reason) = self.check_sender(&sender) {
                    return PacketOutcome::Dropped(reason);
                }
                PacketOutcome::Data(self.handle_unicast(packet))
            }
            MeshPacket::Broadcast(packet) => {
                if let Some(reason) = self.check_sender(&sender) {
                    return PacketOutcome::Dropped(reason);
                }
                PacketOutcome::Data(self.handle_broadcast(packet))
            }
        }
    }

    fn check_sender(&self, sender: &LinkAddr) -> Option<DropReason> {
        if self.is_my_addr(sender) {
            trace!("Drop packet: received my own broadcast (sender {})", sender);
            return Some(DropReason::OwnSender);
        }
        if sender.is_broadcast() {
            debug!("Drop packet: broadcast source address");
            return Some(DropReason::BroadcastSender);
        }
        None
    }

    /// Process a decoded routing packet
    pub fn handle_routing_packet(
        &mut self,
        mut packet: RoutingPacket,
        sender: LinkAddr,
        iface: IfaceId,
        now: u64,
    ) -> PacketOutcome {
        let iface_addr = match self.interfaces.get(iface.index()) {
            Some(local) => local.addr,
            None => return PacketOutcome::Dropped(DropReason::UnknownInterface),
        };
        if let Some(reason) = self.check_sender(&sender) {
            return PacketOutcome::Dropped(reason);
        }

        trace!(
            "Received routing packet via {} on {} (orig {}, seqno {}, ttl {}, tq {}, flags {:#04x})",
            sender,
            iface,
            packet.orig,
            packet.seqno,
            packet.ttl,
            packet.tq,
            packet.flags
        );

        if self.is_my_addr(&packet.orig) {
            self.record_echo(&packet, sender, iface, iface_addr, now);
            return PacketOutcome::Dropped(DropReason::OwnBroadcastEcho);
        }

        if packet.is_unidirectional() {
            trace!("Drop packet: unidirectional flag (orig {})", packet.orig);
            return PacketOutcome::Dropped(DropReason::Unidirectional);
        }

        let orig = packet.orig;
        let seqno = packet.seqno;
        let sender_key = NeighborKey::new(sender, iface);

        // windows and duplicate detection
        let entry = self.reach.get_or_create(orig, now);
        entry.last_seen = now;
        let has_history = entry.duplicate_window.count() > 0;
        let diff = seq_diff(seqno, entry.last_real_seqno);

        if has_history && diff < 0 && ((-diff) as usize) < WINDOW_SIZE {
            let position = (-diff) as usize;
            entry.duplicate_window.mark_position(position);
            let record = entry.neighbor_or_insert(sender_key, now);
            record.record_late_reception(position);
            record.touch(now);
            debug!("Late packet from {} seqno {} ({} behind)", orig, seqno, position);
            return PacketOutcome::Late;
        }

        let is_duplicate = has_history && entry.duplicate_window.status(entry.last_real_seqno, seqno);
        entry.duplicate_window.mark_and_test(diff, true);
        entry.neighbor_or_insert(sender_key, now).touch(now);
        for record in entry.neighbors_mut() {
            let here = record.matches(&sender_key);
            record.record_reception(diff, here);
        }
        if diff != 0 {
            entry.last_real_seqno = seqno;
        }
        if !is_duplicate {
            entry.last_ttl = packet.ttl;
        }
        let last_ttl = entry.last_ttl;
        let last_real_seqno = entry.last_real_seqno;

        // link quality towards the sender
        let sender_entry = self.reach.get_or_create(sender, now);
        let estimate = self.estimator.assess(sender_entry, iface, packet.tq);
        packet.tq = estimate.tq;
        let bidirectional = estimate.bidirectional;

        if !is_duplicate {
            if bidirectional {
                self.update_ranking(orig, sender_key, &packet);
            }
            self.update_announcements(&packet, now);
        }

        // relay decision
        if self.is_my_addr(&packet.prev_sender) {
            trace!("Drop packet: our own relay came back (orig {})", orig);
            return PacketOutcome::Routing {
                duplicate: is_duplicate,
                bidirectional,
                relayed: false,
            };
        }

        let is_bntog = self
            .reach
            .get(&orig)
            .and_then(|e| e.best_route())
            .map(|n| n.neighbor_address == sender)
            .unwrap_or(false);

        let relay = if orig == sender {
            // direct neighbour: always echo back on the incoming interface
            Some((true, !(bidirectional && is_bntog)))
        } else if bidirectional && is_bntog {
            if !is_duplicate {
                Some((false, false))
            } else if seqno == last_real_seqno && (last_ttl as i16 - 3) <= packet.ttl as i16 {
                trace!("Forward packet: duplicate via best neighbour with best ttl");
                Some((false, false))
            } else {
                trace!("Drop packet: duplicate via best neighbour but not best ttl");
                None
            }
        } else {
            trace!(
                "Drop packet: bidirectional {} best neighbour {} (orig {})",
                bidirectional,
                is_bntog,
                orig
            );
            None
        };

        let relayed = match relay {
            Some((direct_link, unidirectional)) => {
                let substitute = self.substitute_quality(&orig, &sender);
                self.scheduler.schedule_relay(
                    RelayRequest {
                        packet,
                        sender,
                        iface,
                        substitute,
                        direct_link,
                        unidirectional,
                    },
                    now,
                )
            }
            None => false,
        };

        PacketOutcome::Routing {
            duplicate: is_duplicate,
            bidirectional,
            relayed,
        }
    }

    /// Our broadcast came back through a neighbour that heard it directly
    fn record_echo(
        &mut self,
        packet: &RoutingPacket,
        sender: LinkAddr,
        iface: IfaceId,
        iface_addr: LinkAddr,
        now: u64,
    ) {
        if !packet.is_direct_link() || packet.orig != iface_addr {
            trace!("Own packet via {} without direct link on {}", sender, iface);
            return;
        }
        let Some(last_sent) = self.last_sent_seqno.get(iface.index()).copied().flatten() else {
            return;
        };
        let offset = last_sent.wrapping_sub(packet.seqno) as usize;
        if offset >= WINDOW_SIZE {
            trace!("Own packet seqno {} via {} outside the window", packet.seqno, sender);
            return;
        }

        let neighbor = self.reach.get_or_create(sender, now);
        if neighbor.record_own_echo(iface, offset) {
            trace!("Bidirectional link indication from {} (seqno {})", sender, packet.seqno);
        }
    }

    fn update_ranking(&mut self, orig: LinkAddr, sender_key: NeighborKey, packet: &RoutingPacket) {
        let Some(entry) = self.reach.get_mut(&orig) else {
            return;
        };
        if let Some(record) = entry.neighbor_mut(&sender_key) {
            record.last_ttl = packet.ttl;
            record.push_quality_sample(packet.tq);
        }
        entry.last_seqno = packet.seqno;

        let change = route::update_route(entry);
        if let Some(change) = change {
            self.notify(change);
        }
    }

    fn update_announcements(&mut self, packet: &RoutingPacket, now: u64) {
        let orig = packet.orig;
        self.hna
            .apply_remote(&mut self.reach, orig, &packet.announcements, now);
        if let Some(entry) = self.reach.get_mut(&orig) {
            entry.announcement_buffer = encode_announcements(&packet.announcements);
            entry.announce_flags = packet.gw_flags;
        }
        self.gateways.update(orig, packet.gw_flags, now);
    }

    /// Quality and TTL of the best route when it does not lead through `sender`
    fn substitute_quality(&self, orig: &LinkAddr, sender: &LinkAddr) -> Option<(u8, u8)> {
        let route = self.reach.get(orig)?.best_route()?;
        if route.neighbor_address == *sender || route.quality_average() == 0 {
            return None;
        }
        Some((route.quality_average(), route.last_ttl))
    }

    fn notify(&self, change: RouteChange) {
        self.observer
            .on_route_changed(change.destination, change.next_hop);
    }

    // ========================================================================
    // DATA PLANE
    // ========================================================================

    /// A frame read from the local virtual interface
    pub fn handle_local_frame(&mut self, frame: &[u8], now: u64) -> FrameOutcome {
        let header = match EthernetHeader::parse(frame) {
            Ok(header) => header,
            Err(e) => {
                debug!("Drop local frame: {}", e);
                return FrameOutcome::Dropped(DropReason::Malformed);
            }
        };

        self.hna.learn_local(header.source, now);

        if header.is_flooded() {
            self.bcast_seqno = self.bcast_seqno.wrapping_add(1);
            let packet = BroadcastDataPacket {
                orig: self.primary_address(),
                seqno: self.bcast_seqno,
                frame: frame.to_vec(),
            };
            self.transmit_everywhere(packet.encode());
            return FrameOutcome::Flooded;
        }

        let dest = match self.hna.resolve(&header.dest) {
            Some(Owner::Local) => {
                trace!("Drop local frame: {} is bridged here", header.dest);
                return FrameOutcome::Dropped(DropReason::LocalHost);
            }
            Some(Owner::Remote(orig)) => orig,
            None => header.dest,
        };

        let Some(route) = self.reach.get(&dest).and_then(|e| e.best_route()) else {
            trace!("Drop local frame: no route to {}", dest);
            return FrameOutcome::Dropped(DropReason::NoRoute);
        };
        let (next_hop, iface) = (route.neighbor_address, route.incoming_interface);

        let packet = UnicastDataPacket {
            ttl: self.config.initial_ttl,
            dest,
            frame: frame.to_vec(),
        };
        self.actions.push(Action::Transmit(Transmission {
            iface,
            dest: next_hop,
            payload: packet.encode(),
        }));
        FrameOutcome::Sent
    }

    fn handle_unicast(&mut self, mut packet: UnicastDataPacket) -> FrameOutcome {
        if self.is_my_addr(&packet.dest) {
            self.actions.push(Action::Deliver(packet.frame));
            return FrameOutcome::Delivered;
        }

        if packet.ttl < 2 {
            debug!("Drop unicast to {}: TTL exceeded", packet.dest);
            return FrameOutcome::Dropped(DropReason::TtlExceeded);
        }

        let Some(route) = self.reach.get(&packet.dest).and_then(|e| e.best_route()) else {
            debug!("Drop unicast: no route to {}", packet.dest);
            return FrameOutcome::Dropped(DropReason::NoRoute);
        };
        let (next_hop, iface) = (route.neighbor_address, route.incoming_interface);

        packet.ttl -= 1;
        self.actions.push(Action::Transmit(Transmission {
            iface,
            dest: next_hop,
            payload: packet.encode(),
        }));
        FrameOutcome::Forwarded
    }

    fn handle_broadcast(&mut self, packet: BroadcastDataPacket) -> FrameOutcome {
        if self.is_my_addr(&packet.orig) {
            return FrameOutcome::Dropped(DropReason::OwnOriginator);
        }

        let Some(entry) = self.reach.get_mut(&packet.orig) else {
            trace!("Drop broadcast: unknown originator {}", packet.orig);
            return FrameOutcome::Dropped(DropReason::UnknownOriginator);
        };

        let has_history = entry.bcast_window.count() > 0;
        if has_history && entry.bcast_window.status(entry.last_bcast_seqno, packet.seqno) {
            return FrameOutcome::Dropped(DropReason::Duplicate);
        }

        let diff = seq_diff(packet.seqno, entry.last_bcast_seqno);
        if has_history && diff < 0 && ((-diff) as usize) < WINDOW_SIZE {
            entry.bcast_window.mark_position((-diff) as usize);
        } else {
            entry.bcast_window.mark_and_test(diff, true);
            if diff != 0 || !has_history {
                entry.last_bcast_seqno = packet.seqno;
            }
        }

        let payload = packet.encode();
        self.actions.push(Action::Deliver(packet.frame));
        self.transmit_everywhere(payload);
        FrameOutcome::Flooded
    }

    fn transmit_everywhere(&mut self, payload: Vec<u8>) {
        for local in &self.interfaces {
            self.actions.push(Action::Transmit(Transmission {
                iface: local.id,
                dest: LinkAddr::BROADCAST,
                payload: payload.clone(),
            }));
        }
    }

    // ========================================================================
    // PERIODIC WORK
    // ========================================================================

    /// Send every due task and run the sweep if it is due.
    /// Returns the number of tasks processed.
    pub fn poll(&mut self, now: u64) -> usize {
        let mut processed = 0;
        while let Some(task) = self.scheduler.pop_due(now) {
            self.transmit_task(task, now);
            processed += 1;
        }

        if matches!(self.next_sweep, Some(due) if due <= now) {
            self.sweep(now);
        }
        processed
    }

    fn schedule_own(&mut self, iface: IfaceId, now: u64) {
        let Some(local) = self.interfaces.get(iface.index()) else {
            return;
        };
        let seqno = self.next_seqno[iface.index()];
        self.next_seqno[iface.index()] = seqno.wrapping_add(1);

        let packet = RoutingPacket {
            flags: 0,
            ttl: self.config.initial_ttl,
            gw_flags: self.config.gateway_class,
            tq: self.config.tq_max,
            seqno,
            orig: local.addr,
            prev_sender: LinkAddr::ZERO,
            announcements: Vec::new(),
        };
        self.scheduler.schedule_own(packet, iface, now);
    }

    fn transmit_task(&mut self, task: ForwardingTask, now: u64) {
        let targets = fan_out(&task, &self.interfaces);
        let own_iface = if task.self_originated { task.outgoing } else { None };
        let mut packet = task.packet;

        if let Some(iface) = own_iface {
            packet.announcements = decode_announcements(self.hna.announcement_buffer());
            if let Some(slot) = self.last_sent_seqno.get_mut(iface.index()) {
                *slot = Some(packet.seqno);
            }
            for entry in self.reach.iter_mut() {
                entry.own_broadcast_sent(iface);
            }
        }

        if targets.is_empty() {
            warn!(
                "Can't send packet of {} (seqno {}) with direct-link or unidirectional flag: outgoing interface not specified",
                packet.orig, packet.seqno
            );
        }

        for (iface, flags) in targets {
            packet.flags = flags;
            match packet.encode() {
                Ok(payload) => {
                    trace!(
                        "Sending packet (orig {}, seqno {}, ttl {}) on {}",
                        packet.orig,
                        packet.seqno,
                        packet.ttl,
                        iface
                    );
                    self.actions.push(Action::Transmit(Transmission {
                        iface,
                        dest: LinkAddr::BROADCAST,
                        payload,
                    }));
                }
                Err(e) => warn!("Can't encode packet of {}: {}", packet.orig, e),
            }
        }

        if let Some(iface) = own_iface {
            self.schedule_own(iface, now);
        }
    }

    /// Maintenance sweep: purge stale originators, neighbours, hosts and
    /// gateways, re-select routes that lost their neighbour, and refresh the
    /// gateway choice.
    pub fn sweep(&mut self, now: u64) {
        let timeout = self.config.purge_timeout_ms;

        for addr in self.reach.stale_addresses(now, timeout) {
            let Some(mut entry) = self.reach.remove(&addr) else {
                continue;
            };
            debug!("Originator timeout: {} (last seen {})", addr, entry.last_seen);
            if let Some(change) = route::remove_route(&mut entry) {
                self.notify(change);
            }
            self.hna.remove_owner(addr);
            self.gateways.mark_deleted(&addr, now);
        }

        let mut changes = Vec::new();
        for entry in self.reach.iter_mut() {
            let previous = entry.best_route_key();
            if entry.purge_neighbors(now, timeout) {
                changes.extend(route::reselect(entry, previous));
            }
        }
        for change in changes {
            self.notify(change);
        }

        self.hna
            .purge_expired(&mut self.reach, now, self.config.announce_age_ms);
        self.gateways.purge_deleted(now, timeout);

        if self.config.routing_class != 0 {
            let choice = choose_gateway(
                &self.gateways,
                &self.reach,
                self.config.routing_class,
                self.config.preferred_gateway,
            );
            self.gateways.set_current(choice);
        }

        if self.next_sweep.is_some() {
            self.next_sweep = Some(now.saturating_add(self.config.sweep_interval_ms));
        }
        debug!("Sweep done: {:?}", self.summary());
    }

    /// Flush every route with one sweep far in the future and drop pending tasks
    pub fn shutdown(&mut self, now: u64) {
        info!("Deleting all routes");
        let flush_at = now
            .saturating_add(self.config.purge_timeout_ms.saturating_mul(5))
            .saturating_add(self.config.originator_interval_ms);
        self.next_sweep = None;
        self.sweep(flush_at);
        self.scheduler.clear();
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            originators: self.reach.len(),
            routed_originators: self
                .reach
                .iter()
                .filter(|e| e.best_route_key().is_some())
                .count(),
            neighbors: self.reach.iter().map(|e| e.neighbors().len()).sum(),
            queued_tasks: self.scheduler.len(),
            announced_hosts: self.hna.len(),
            local_hosts: self.hna.local_hosts().len(),
            gateways: self.gateways.active_count(),
        }
    }
}
