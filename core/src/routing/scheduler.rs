//! Forwarding scheduler
//!
//! A due-time ordered queue of routing packets waiting to go out: our own
//! periodic broadcasts (jittered) and relays of received broadcasts (due
//! immediately). The queue is kept sorted on every insert, so draining stops
//! at the first task that is not yet due.

use super::address::{IfaceId, LinkAddr, LocalInterface};
use crate::config::EngineConfig;
use crate::wire::{RoutingPacket, FLAG_DIRECT_LINK, FLAG_UNIDIRECTIONAL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingTask {
    pub due_time: u64,
    pub self_originated: bool,
    /// Packet to send; flags are derived per interface at transmission
    pub packet: RoutingPacket,
    /// Interface the task belongs to; `None` means every interface
    pub outgoing: Option<IfaceId>,
    pub direct_link: bool,
    pub unidirectional: bool,
}

/// Parameters of a relay decided by the reception pipeline
#[derive(Debug, Clone)]
pub struct RelayRequest {
    /// Packet as received, quality already replaced by the local estimate
    pub packet: RoutingPacket,
    /// Link-layer sender; becomes the previous-sender field
    pub sender: LinkAddr,
    pub iface: IfaceId,
    /// Best route's own (quality, ttl) when the route is not via `sender`
    pub substitute: Option<(u8, u8)>,
    pub direct_link: bool,
    pub unidirectional: bool,
}

pub struct ForwardingScheduler {
    queue: VecDeque<ForwardingTask>,
    rng: StdRng,
    interval: u64,
    jitter: u64,
    tq_max: u32,
    hop_penalty: u32,
}

impl ForwardingScheduler {
    pub fn new(config: &EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            queue: VecDeque::new(),
            rng,
            interval: config.originator_interval_ms,
            jitter: config.jitter_ms,
            tq_max: config.tq_max as u32,
            hop_penalty: config.hop_penalty as u32,
        }
    }

    /// Insert keeping ascending due order; equal due times keep FIFO order
    pub fn enqueue(&mut self, task: ForwardingTask) {
        let pos = self.queue.partition_point(|t| t.due_time <= task.due_time);
        self.queue.insert(pos, task);
    }

    /// Due time of the next self-originated broadcast: `interval ± jitter`
    pub fn next_own_due(&mut self, now: u64) -> u64 {
        let offset = self.rng.gen_range(0..=self.jitter.saturating_mul(2));
        now.saturating_add(self.interval - self.jitter).saturating_add(offset)
    }

    /// Queue our own broadcast for `iface` one jittered period from `now`
    pub fn schedule_own(&mut self, packet: RoutingPacket, iface: IfaceId, now: u64) -> u64 {
        let due_time = self.next_own_due(now);
        trace!(
            "Scheduling own packet seqno {} on {} at {}",
            packet.seqno,
            iface,
            due_time
        );
        self.enqueue(ForwardingTask {
            due_time,
            self_originated: true,
            packet,
            outgoing: Some(iface),
            direct_link: false,
            unidirectional: false,
        });
        due_time
    }

    /// Queue a relay. Returns false when the TTL is exhausted.
    pub fn schedule_relay(&mut self, request: RelayRequest, now: u64) -> bool {
        let mut packet = request.packet;
        if packet.ttl <= 1 {
            debug!(
                "TTL exceeded, not relaying {} seqno {}",
                packet.orig, packet.seqno
            );
            return false;
        }

        let (tq, ttl) = request.substitute.unwrap_or((packet.tq, packet.ttl));
        if ttl <= 1 {
            debug!(
                "Best route TTL exceeded, not relaying {} seqno {}",
                packet.orig, packet.seqno
            );
            return false;
        }

        packet.ttl = ttl - 1;
        packet.prev_sender = request.sender;
        packet.tq = (tq as u32 * (self.tq_max - self.hop_penalty) / self.tq_max) as u8;
        packet.flags = 0;

        self.enqueue(ForwardingTask {
            due_time: now,
            self_originated: false,
            packet,
            outgoing: Some(request.iface),
            direct_link: request.direct_link,
            unidirectional: request.unidirectional,
        });
        true
    }

    /// Pop the front task if it is due at `now`
    pub fn pop_due(&mut self, now: u64) -> Option<ForwardingTask> {
        if self.queue.front()?.due_time <= now {
            self.queue.pop_front()
        } else {
            None
        }
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.front().map(|t| t.due_time)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForwardingTask> {
        self.queue.iter()
    }
}

/// Interfaces a due task goes out of, with the flags for each.
///
/// Unidirectional tasks and direct-link tasks on their last hop stay on their
/// own interface. Everything else goes out of every interface, carrying the
/// direct-link flag only on the task's own one. A task that needs its own
/// interface but has none yields nothing.
pub fn fan_out(task: &ForwardingTask, interfaces: &[LocalInterface]) -> Vec<(IfaceId, u8)> {
    if task.unidirectional {
        return match task.outgoing {
            Some(iface) => vec![(iface, FLAG_UNIDIRECTIONAL | FLAG_DIRECT_LINK)],
            None => Vec::new(),
        };
    }

    if task.direct_link && task.packet.ttl == 1 {
        return match task.outgoing {
            Some(iface) => vec![(iface, FLAG_DIRECT_LINK)],
            None => Vec::new(),
        };
    }

    if task.direct_link && task.outgoing.is_none() {
        return Vec::new();
    }

    interfaces
        .iter()
        .map(|local| {
            let flags = if task.direct_link && task.outgoing == Some(local.id) {
                FLAG_DIRECT_LINK
            } else {
                0
            };
            (local.id, flags)
        })
        .collect()
}
