//! Link-quality estimation
//!
//! Combines how many of our own broadcasts a neighbour echoed back with how
//! many of the neighbour's broadcasts we received, applies a cubic penalty for
//! sparse reception, and multiplies the result into the quality accumulated by
//! the upstream hops.

use super::address::IfaceId;
use super::originator::ReachabilityEntry;
use super::window::WINDOW_SIZE;
use crate::config::EngineConfig;

/// Result of one estimation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEstimate {
    /// Local link quality towards the neighbour
    pub tq_local: u8,
    /// Asymmetry penalty factor (MAX = no penalty)
    pub tq_asym_penalty: u8,
    /// Upstream quality multiplied by the local assessment
    pub tq: u8,
    /// True when `tq` reaches the bidirectional limit
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkQualityEstimator {
    max: u32,
    send_minimum: u32,
    recv_minimum: u32,
    bidirectional_limit: u8,
}

impl LinkQualityEstimator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max: config.tq_max as u32,
            send_minimum: config.local_send_minimum,
            recv_minimum: config.local_recv_minimum,
            bidirectional_limit: config.bidirectional_limit,
        }
    }

    /// Pure estimation from raw sample counts.
    ///
    /// `echo_count` is how many of our last broadcasts the neighbour relayed
    /// back to us; `received_count` is how many of the neighbour's own
    /// broadcasts we received directly from it.
    pub fn estimate(&self, incoming_tq: u8, echo_count: u32, received_count: u32) -> LinkEstimate {
        let max = self.max as u64;
        let cap = WINDOW_SIZE as u64;
        let received = (received_count as u64).min(cap);
        let total = (echo_count as u64).min(received);

        let tq_local = if total < self.send_minimum as u64 || received < self.recv_minimum as u64 {
            0
        } else {
            max * total / received
        };

        let missing = cap - received;
        let tq_asym_penalty = max - max * missing * missing * missing / (cap * cap * cap);

        let tq = (incoming_tq as u64).min(max) * tq_local * tq_asym_penalty / (max * max);
        let tq = tq.min(max) as u8;

        LinkEstimate {
            tq_local: tq_local as u8,
            tq_asym_penalty: tq_asym_penalty as u8,
            tq,
            bidirectional: tq >= self.bidirectional_limit,
        }
    }

    /// Estimate the link to `neighbor` (a direct neighbour's own entry) as
    /// heard on `iface`, storing the intermediate terms on the entry.
    pub fn assess(
        &self,
        neighbor: &mut ReachabilityEntry,
        iface: IfaceId,
        incoming_tq: u8,
    ) -> LinkEstimate {
        let echo_count = neighbor.own_broadcast_count(iface);
        let key = super::neighbor::NeighborKey::new(neighbor.address(), iface);
        let received_count = neighbor
            .neighbor(&key)
            .map(|n| n.received_count())
            .unwrap_or(0);

        let estimate = self.estimate(incoming_tq, echo_count, received_count);
        neighbor.tq_local = estimate.tq_local;
        neighbor.tq_asym_penalty = estimate.tq_asym_penalty;
        estimate
    }
}
