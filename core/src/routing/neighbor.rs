//! One-hop link records
//!
//! A [`NeighborRecord`] tracks how packets of one originator arrive through one
//! specific neighbour on one specific local interface: how many of the last
//! [`WINDOW_SIZE`](super::window::WINDOW_SIZE) sequence numbers came this way,
//! and a short rolling history of the quality values carried by them.

use super::address::{IfaceId, LinkAddr};
use super::window::SlidingWindow;

/// Length of the rolling quality history per neighbour
pub const QUALITY_HISTORY: usize = 5;

/// Identity of a neighbour record inside its originator entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborKey {
    pub addr: LinkAddr,
    pub iface: IfaceId,
}

impl NeighborKey {
    pub fn new(addr: LinkAddr, iface: IfaceId) -> Self {
        Self { addr, iface }
    }
}

#[derive(Debug, Clone)]
pub struct NeighborRecord {
    pub neighbor_address: LinkAddr,
    pub incoming_interface: IfaceId,
    /// Raw receptions of the originator's sequence numbers via this neighbour
    pub receive_window: SlidingWindow,
    received_count: u32,
    quality_samples: [u8; QUALITY_HISTORY],
    sample_count: usize,
    next_sample: usize,
    quality_average: u8,
    /// TTL of the last non-duplicate packet received via this neighbour
    pub last_ttl: u8,
    /// Monotonic milliseconds of the last reception via this neighbour
    pub last_seen: u64,
}

impl NeighborRecord {
    pub fn new(neighbor_address: LinkAddr, incoming_interface: IfaceId, now: u64) -> Self {
        Self {
            neighbor_address,
            incoming_interface,
            receive_window: SlidingWindow::new(),
            received_count: 0,
            quality_samples: [0; QUALITY_HISTORY],
            sample_count: 0,
            next_sample: 0,
            quality_average: 0,
            last_ttl: 0,
            last_seen: now,
        }
    }

    pub fn key(&self) -> NeighborKey {
        NeighborKey::new(self.neighbor_address, self.incoming_interface)
    }

    pub fn matches(&self, key: &NeighborKey) -> bool {
        self.neighbor_address == key.addr && self.incoming_interface == key.iface
    }

    /// Advance the reception window by `offset`, marking the newest slot if
    /// the packet arrived through this neighbour.
    pub fn record_reception(&mut self, offset: i32, received_here: bool) -> bool {
        let is_new = self.receive_window.mark_and_test(offset, received_here);
        self.received_count = self.receive_window.count();
        is_new
    }

    /// Record a late arrival `position` sequence numbers behind the newest one
    pub fn record_late_reception(&mut self, position: usize) -> bool {
        let is_new = self.receive_window.mark_position(position);
        self.received_count = self.receive_window.count();
        is_new
    }

    /// Packets of the originator received via this neighbour out of the last window
    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    /// Replace the oldest quality sample and recompute the mean.
    ///
    /// Only filled slots take part in the mean, so a fresh neighbour is
    /// ranked by the samples it actually delivered.
    pub fn push_quality_sample(&mut self, tq: u8) -> u8 {
        self.quality_samples[self.next_sample] = tq;
        self.next_sample = (self.next_sample + 1) % QUALITY_HISTORY;
        if self.sample_count < QUALITY_HISTORY {
            self.sample_count += 1;
        }

        let sum: u32 = self.quality_samples[..self.sample_count]
            .iter()
            .map(|s| *s as u32)
            .sum();
        self.quality_average = (sum / self.sample_count as u32) as u8;
        self.quality_average
    }

    pub fn quality_average(&self) -> u8 {
        self.quality_average
    }

    pub fn touch(&mut self, now: u64) {
        self.last_seen = now;
    }

    /// Stale once nothing arrived for `2 * timeout` milliseconds
    pub fn is_stale(&self, now: u64, timeout: u64) -> bool {
        self.last_seen.saturating_add(timeout.saturating_mul(2)) < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> NeighborRecord {
        NeighborRecord::new(LinkAddr([2, 0, 0, 0, 0, 1]), IfaceId(0), 1_000)
    }

    #[test]
    fn test_quality_average_over_filled_slots() {
        let mut record = make_record();
        assert_eq!(record.quality_average(), 0);

        assert_eq!(record.push_quality_sample(200), 200);
        assert_eq!(record.push_quality_sample(100), 150);
    }

    #[test]
    fn test_quality_history_rolls_over() {
        let mut record = make_record();
        for _ in 0..QUALITY_HISTORY {
            record.push_quality_sample(200);
        }
        assert_eq!(record.quality_average(), 200);

        for _ in 0..QUALITY_HISTORY {
            record.push_quality_sample(140);
        }
        assert_eq!(record.quality_average(), 140);
    }

    #[test]
    fn test_received_count_tracks_window() {
        let mut record = make_record();
        record.record_reception(1, true);
        record.record_reception(1, false);
        record.record_reception(1, true);
        assert_eq!(record.received_count(), 2);

        assert!(record.record_late_reception(1));
        assert_eq!(record.received_count(), 3);
    }

    #[test]
    fn test_staleness() {
        let record = make_record();
        assert!(!record.is_stale(1_000 + 2 * 500, 500));
        assert!(record.is_stale(1_000 + 2 * 500 + 1, 500));
        assert!(!record.is_stale(u64::MAX, u64::MAX));
    }

    #[test]
    fn test_key_matching() {
        let record = make_record();
        assert!(record.matches(&record.key()));
        assert!(!record.matches(&NeighborKey::new(record.neighbor_address, IfaceId(1))));
    }
}
