//! Reachability (originator) table
//!
//! One [`ReachabilityEntry`] per known mesh node. An entry owns the neighbour
//! records through which the node's broadcasts were heard, the identifier of
//! the currently installed best route among them, and the windows used for
//! duplicate suppression and own-broadcast echo counting.
//!
//! The best route is stored as a [`NeighborKey`] and always resolved through
//! the entry's own neighbour list, so removing a neighbour can never leave a
//! dangling route behind.

use super::address::{IfaceId, LinkAddr};
use super::neighbor::{NeighborKey, NeighborRecord};
use super::window::SlidingWindow;
use std::collections::{BTreeSet, HashMap, TryReserveError};
use tracing::{debug, warn};

/// Initial bucket capacity of the reachability table
pub const INITIAL_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
pub struct ReachabilityEntry {
    address: LinkAddr,
    best_route: Option<NeighborKey>,
    /// Highest sequence number accepted as new for ranking
    pub last_seqno: u16,
    /// Highest sequence number recorded in the windows
    pub last_real_seqno: u16,
    /// Reference point of the broadcast data flood window
    pub last_bcast_seqno: u16,
    /// Global duplicate suppression over the originator's sequence numbers
    pub duplicate_window: SlidingWindow,
    /// Duplicate suppression for flooded data frames
    pub bcast_window: SlidingWindow,
    own_broadcast_window: Vec<SlidingWindow>,
    /// Local link quality towards this node as a direct neighbour
    pub tq_local: u8,
    /// Asymmetry penalty applied to `tq_local`
    pub tq_asym_penalty: u8,
    neighbors: Vec<NeighborRecord>,
    /// Hosts this node currently announces as bridged behind it
    pub announcements: BTreeSet<LinkAddr>,
    /// Raw encoding of the last announcement list received from this node
    pub announcement_buffer: Vec<u8>,
    /// Capability byte (gateway class) forwarded unchanged
    pub announce_flags: u8,
    /// TTL of the last non-duplicate packet
    pub last_ttl: u8,
    /// Monotonic milliseconds of the last accepted packet
    pub last_seen: u64,
}

impl ReachabilityEntry {
    pub fn new(address: LinkAddr, num_ifaces: usize, now: u64) -> Self {
        Self {
            address,
            best_route: None,
            last_seqno: 0,
            last_real_seqno: 0,
            last_bcast_seqno: 0,
            duplicate_window: SlidingWindow::new(),
            bcast_window: SlidingWindow::new(),
            own_broadcast_window: vec![SlidingWindow::new(); num_ifaces],
            tq_local: 0,
            tq_asym_penalty: 0,
            neighbors: Vec::new(),
            announcements: BTreeSet::new(),
            announcement_buffer: Vec::new(),
            announce_flags: 0,
            last_ttl: 0,
            last_seen: now,
        }
    }

    pub fn address(&self) -> LinkAddr {
        self.address
    }

    pub fn best_route_key(&self) -> Option<NeighborKey> {
        self.best_route
    }

    /// The installed next hop, resolved through the owned neighbour list
    pub fn best_route(&self) -> Option<&NeighborRecord> {
        let key = self.best_route?;
        self.neighbors.iter().find(|n| n.matches(&key))
    }

    /// Local interface of the installed route
    pub fn outgoing_interface(&self) -> Option<IfaceId> {
        self.best_route().map(|n| n.incoming_interface)
    }

    /// Install or clear the best route. Keys that are not part of this
    /// entry's neighbour list are refused.
    pub(crate) fn set_best_route(&mut self, key: Option<NeighborKey>) -> bool {
        match key {
            Some(k) if !self.neighbors.iter().any(|n| n.matches(&k)) => false,
            _ => {
                self.best_route = key;
                true
            }
        }
    }

    pub fn neighbors(&self) -> &[NeighborRecord] {
        &self.neighbors
    }

    pub fn neighbors_mut(&mut self) -> &mut [NeighborRecord] {
        &mut self.neighbors
    }

    pub fn neighbor(&self, key: &NeighborKey) -> Option<&NeighborRecord> {
        self.neighbors.iter().find(|n| n.matches(key))
    }

    pub fn neighbor_mut(&mut self, key: &NeighborKey) -> Option<&mut NeighborRecord> {
        self.neighbors.iter_mut().find(|n| n.matches(key))
    }

    /// Lookup-or-create the record for `key`
    pub fn neighbor_or_insert(&mut self, key: NeighborKey, now: u64) -> &mut NeighborRecord {
        let pos = match self.neighbors.iter().position(|n| n.matches(&key)) {
            Some(pos) => pos,
            None => {
                debug!(
                    "New last-hop neighbour {} via {} for originator {}",
                    key.addr, key.iface, self.address
                );
                self.neighbors.push(NeighborRecord::new(key.addr, key.iface, now));
                self.neighbors.len() - 1
            }
        };
        &mut self.neighbors[pos]
    }

    /// One of our own broadcasts left through `iface`: age the echo window
    pub fn own_broadcast_sent(&mut self, iface: IfaceId) {
        if let Some(window) = self.own_broadcast_window.get_mut(iface.index()) {
            window.mark_and_test(1, false);
        }
    }

    /// Our broadcast sent `offset` broadcasts ago was echoed back by this node
    pub fn record_own_echo(&mut self, iface: IfaceId, offset: usize) -> bool {
        match self.own_broadcast_window.get_mut(iface.index()) {
            Some(window) => window.mark_position(offset),
            None => false,
        }
    }

    pub fn own_broadcast_window(&self, iface: IfaceId) -> Option<&SlidingWindow> {
        self.own_broadcast_window.get(iface.index())
    }

    /// How many of our last broadcasts on `iface` were echoed by this node
    pub fn own_broadcast_count(&self, iface: IfaceId) -> u32 {
        self.own_broadcast_window
            .get(iface.index())
            .map(|w| w.count())
            .unwrap_or(0)
    }

    /// Drop neighbour records silent for `2 * timeout`. Returns true if any
    /// record was removed; an installed route through a removed record is
    /// cleared so the caller can re-run route selection.
    pub fn purge_neighbors(&mut self, now: u64, timeout: u64) -> bool {
        let before = self.neighbors.len();
        let address = self.address;
        self.neighbors.retain(|n| {
            let stale = n.is_stale(now, timeout);
            if stale {
                debug!(
                    "Neighbour timeout: {} via {} for originator {}",
                    n.neighbor_address, n.incoming_interface, address
                );
            }
            !stale
        });

        if let Some(key) = self.best_route {
            if !self.neighbors.iter().any(|n| n.matches(&key)) {
                self.best_route = None;
            }
        }

        self.neighbors.len() != before
    }

    pub fn is_stale(&self, now: u64, timeout: u64) -> bool {
        self.last_seen.saturating_add(timeout.saturating_mul(2)) < now
    }
}

/// Hash map of all known originators keyed by address
#[derive(Debug)]
pub struct ReachabilityTable {
    entries: HashMap<LinkAddr, ReachabilityEntry>,
    num_ifaces: usize,
}

impl ReachabilityTable {
    /// Allocate the table. Failure here is the one unrecoverable condition.
    pub fn new(num_ifaces: usize) -> Result<Self, TryReserveError> {
        let mut entries = HashMap::new();
        entries.try_reserve(INITIAL_CAPACITY)?;
        Ok(Self {
            entries,
            num_ifaces,
        })
    }

    pub fn get(&self, addr: &LinkAddr) -> Option<&ReachabilityEntry> {
        self.entries.get(addr)
    }

    pub fn get_mut(&mut self, addr: &LinkAddr) -> Option<&mut ReachabilityEntry> {
        self.entries.get_mut(addr)
    }

    pub fn contains(&self, addr: &LinkAddr) -> bool {
        self.entries.contains_key(addr)
    }

    /// Lookup-or-create. A failed resize is logged and the insert proceeds
    /// at a higher load factor.
    pub fn get_or_create(&mut self, addr: LinkAddr, now: u64) -> &mut ReachabilityEntry {
        if !self.entries.contains_key(&addr) {
            if self.entries.len() == self.entries.capacity() {
                if let Err(e) = self.entries.try_reserve(self.entries.len().max(1)) {
                    warn!("Couldn't resize originator table: {}", e);
                }
            }
            debug!("Creating new originator: {}", addr);
        }
        let num_ifaces = self.num_ifaces;
        self.entries
            .entry(addr)
            .or_insert_with(|| ReachabilityEntry::new(addr, num_ifaces, now))
    }

    pub fn remove(&mut self, addr: &LinkAddr) -> Option<ReachabilityEntry> {
        self.entries.remove(addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReachabilityEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReachabilityEntry> {
        self.entries.values_mut()
    }

    pub fn addresses(&self) -> Vec<LinkAddr> {
        self.entries.keys().copied().collect()
    }

    /// Addresses of entries silent for `2 * timeout`
    pub fn stale_addresses(&self, now: u64, timeout: u64) -> Vec<LinkAddr> {
        self.entries
            .values()
            .filter(|e| e.is_stale(now, timeout))
            .map(|e| e.address)
            .collect()
    }

    pub fn num_ifaces(&self) -> usize {
        self.num_ifaces
    }
}
