//! Host announcement table
//!
//! Maps hosts that do not run the protocol to the mesh node bridging them.
//! Hosts seen on our own bridge are owned locally and announced in our
//! broadcasts; hosts announced by other nodes are owned by that node's
//! reachability entry and follow its announcement list. Both kinds age out
//! unless refreshed. Our own interface addresses are never learned.

use super::address::LinkAddr;
use super::originator::ReachabilityTable;
use crate::wire::packet::{encode_announcements, MAX_ANNOUNCEMENTS};
use crate::wire::ROUTING_HEADER_LEN;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Node bridging a host onto the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Bridged by this node
    Local,
    /// Bridged by the originator with this address
    Remote(LinkAddr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAnnouncementEntry {
    pub host: LinkAddr,
    pub owner: Owner,
    pub last_refresh: u64,
}

#[derive(Debug)]
pub struct HostAnnouncementTable {
    entries: HashMap<LinkAddr, HostAnnouncementEntry>,
    changed: bool,
    buffer: Vec<u8>,
    max_hosts: usize,
    interface_addrs: BTreeSet<LinkAddr>,
}

impl HostAnnouncementTable {
    /// `max_packet_size` bounds how many local hosts fit in one broadcast.
    /// `interface_addrs` are this node's own addresses, which are never
    /// learned as bridged hosts.
    pub fn new(
        max_packet_size: usize,
        interface_addrs: impl IntoIterator<Item = LinkAddr>,
    ) -> Self {
        let space = max_packet_size.saturating_sub(ROUTING_HEADER_LEN) / 6;
        Self {
            entries: HashMap::new(),
            changed: false,
            buffer: Vec::new(),
            max_hosts: space.min(MAX_ANNOUNCEMENTS),
            interface_addrs: interface_addrs.into_iter().collect(),
        }
    }


    pub fn get(&self, host: &LinkAddr) -> Option<&HostAnnouncementEntry> {
        self.entries.get(host)
    }

    /// Owner of `host`, if it is known
    pub fn resolve(&self, host: &LinkAddr) -> Option<Owner> {
        self.entries.get(host).map(|e| e.owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostAnnouncementEntry> {
        self.entries.values()
    }

    /// A frame from the local bridge carried `host` as its source.
    ///
    /// Returns true if a new local entry was created. Hosts already owned
    /// by another node are left with it. Our own interface addresses are
    /// refused.
    pub fn learn_local(&mut self, host: LinkAddr, now: u64) -> bool {
        if !host.is_learnable() || self.interface_addrs.contains(&host) {
            return false;
        }

        match self.entries.get_mut(&host) {
            Some(entry) => {
                if entry.owner == Owner::Local {
                    entry.last_refresh = now;
                }
                false
            }
            None => {
                debug!("Added local host {}", host);
                self.entries.insert(
                    host,
                    HostAnnouncementEntry {
                        host,
                        owner: Owner::Local,
                        last_refresh: now,
                    },
                );
                self.changed = true;
                true
            }
        }
    }

    /// Apply the announcement list `hosts` received from `orig`.
    ///
    /// Hosts new to the list are (re-)owned by `orig`, evicting any previous
    /// owner; hosts that left the list are deleted; hosts still listed are
    /// refreshed.
    pub fn apply_remote(
        &mut self,
        reach: &mut ReachabilityTable,
        orig: LinkAddr,
        hosts: &[LinkAddr],
        now: u64,
    ) {
        let announced: BTreeSet<LinkAddr> =
            hosts.iter().copied().filter(|h| h.is_learnable()).collect();
        let previous = match reach.get(&orig) {
            Some(entry) => entry.announcements.clone(),
            None => return,
        };

        for host in previous.difference(&announced) {
            if self.remove_if_owned(host, Owner::Remote(orig)) {
                debug!("Removed host {} announced by {}", host, orig);
            }
        }

        for host in &announced {
            let evicted = match self.entries.get_mut(host) {
                Some(entry) if entry.owner == Owner::Remote(orig) => {
                    entry.last_refresh = now;
                    continue;
                }
                Some(entry) => Some(entry.owner),
                None => None,
            };

            match evicted {
                Some(Owner::Local) => {
                    debug!("Host {} moved from us to {}", host, orig);
                }
                Some(Owner::Remote(prev)) => {
                    debug!("Host {} moved from {} to {}", host, prev, orig);
                    if let Some(prev_entry) = reach.get_mut(&prev) {
                        prev_entry.announcements.remove(host);
                    }
                }
                None => debug!("Added host {} via {}", host, orig),
            }

            self.entries.insert(
                *host,
                HostAnnouncementEntry {
                    host: *host,
                    owner: Owner::Remote(orig),
                    last_refresh: now,
                },
            );
            self.changed = true;
        }

        if let Some(entry) = reach.get_mut(&orig) {
            entry.announcements = announced;
        }
    }

    /// Drop every host owned by `orig` (its reachability entry is going away)
    pub fn remove_owner(&mut self, orig: LinkAddr) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner != Owner::Remote(orig));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Removed {} hosts of purged originator {}", removed, orig);
            self.changed = true;
        }
        removed
    }

    /// Age out hosts not refreshed within `age`, local and remote alike.
    /// Our interface addresses are exempt.
    pub fn purge_expired(&mut self, reach: &mut ReachabilityTable, now: u64, age: u64) -> usize {
        let expired: Vec<HostAnnouncementEntry> = self
            .entries
            .values()
            .filter(|e| {
                !self.interface_addrs.contains(&e.host) && e.last_refresh.saturating_add(age) < now
            })
            .cloned()
            .collect();

        for entry in &expired {
            self.entries.remove(&entry.host);
            if let Owner::Remote(orig) = entry.owner {
                if let Some(owner) = reach.get_mut(&orig) {
                    owner.announcements.remove(&entry.host);
                }
            }
            debug!("Host {} timed out", entry.host);
        }

        if !expired.is_empty() {
            self.changed = true;
        }
        expired.len()
    }

    /// Hosts we announce, in address order
    pub fn local_hosts(&self) -> Vec<LinkAddr> {
        let mut hosts: Vec<LinkAddr> = self
            .entries
            .values()
            .filter(|e| e.owner == Owner::Local)
            .map(|e| e.host)
            .collect();
        hosts.sort();
        hosts
    }

    /// Raw announcement list for our next broadcast, re-serialised if the
    /// table changed. Hosts beyond the packet space are left out.
    pub fn announcement_buffer(&mut self) -> &[u8] {
        if self.changed {
            let mut hosts = self.local_hosts();
            if hosts.len() > self.max_hosts {
                warn!(
                    "Announcing {} of {} local hosts, packet space exhausted",
                    self.max_hosts,
                    hosts.len()
                );
                hosts.truncate(self.max_hosts);
            }
            self.buffer = encode_announcements(&hosts);
            self.changed = false;
        }
        &self.buffer
    }

    fn remove_if_owned(&mut self, host: &LinkAddr, owner: Owner) -> bool {
        match self.entries.get(host) {
            Some(entry) if entry.owner == owner => {
                self.entries.remove(host);
                self.changed = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::packet::decode_announcements;

    fn addr(n: u8) -> LinkAddr {
        LinkAddr([2, 0, 0, 0, 0, n])
    }

    fn host(n: u8) -> LinkAddr {
        LinkAddr([0x0a, 0, 0, 0, 0, n])
    }

    fn setup() -> (HostAnnouncementTable, ReachabilityTable) {
        let mut reach = ReachabilityTable::new(1).unwrap();
        reach.get_or_create(addr(1), 0);
        reach.get_or_create(addr(2), 0);
        (HostAnnouncementTable::new(1500, [addr(9)]), reach)
    }

    #[test]
    fn test_learn_local_ignores_special_addresses() {
        let (mut table, _) = setup();
        assert!(!table.learn_local(LinkAddr::BROADCAST, 0));
        assert!(!table.learn_local(LinkAddr::ZERO, 0));
        assert!(!table.learn_local(LinkAddr([0x01, 0, 0x5e, 0, 0, 1]), 0));
        assert!(table.learn_local(host(1), 0));
        assert!(!table.learn_local(host(1), 10));
        assert_eq!(table.get(&host(1)).unwrap().last_refresh, 10);
        assert_eq!(table.resolve(&host(1)), Some(Owner::Local));
    }

    #[test]
    fn test_remote_diff() {
        let (mut table, mut reach) = setup();
        table.apply_remote(&mut reach, addr(1), &[host(1), host(2)], 0);
        assert_eq!(table.len(), 2);
        assert_eq!(reach.get(&addr(1)).unwrap().announcements.len(), 2);

        table.apply_remote(&mut reach, addr(1), &[host(2), host(3)], 10);
        assert!(table.resolve(&host(1)).is_none());
        assert_eq!(table.resolve(&host(3)), Some(Owner::Remote(addr(1))));
        assert_eq!(table.get(&host(2)).unwrap().last_refresh, 10);
    }

    #[test]
    fn test_reannounce_moves_owner() {
        let (mut table, mut reach) = setup();
        table.apply_remote(&mut reach, addr(1), &[host(7)], 0);
        table.apply_remote(&mut reach, addr(2), &[host(7)], 5);

        assert_eq!(table.resolve(&host(7)), Some(Owner::Remote(addr(2))));
        assert!(reach.get(&addr(1)).unwrap().announcements.is_empty());
        assert!(reach.get(&addr(2)).unwrap().announcements.contains(&host(7)));
    }

    #[test]
    fn test_evicting_local_host_marks_change() {
        let (mut table, mut reach) = setup();
        table.learn_local(host(1), 0);
        table.announcement_buffer();
        assert!(!table.is_changed());

        table.apply_remote(&mut reach, addr(1), &[host(1)], 5);
        assert!(table.is_changed());
        assert!(table.announcement_buffer().is_empty());
    }

    #[test]
    fn test_remote_hosts_age_out() {
        let (mut table, mut reach) = setup();
        table.apply_remote(&mut reach, addr(1), &[host(2)], 0);

        assert_eq!(table.purge_expired(&mut reach, 1_000, 500), 1);
        assert!(table.resolve(&host(2)).is_none());
        assert!(reach.get(&addr(1)).unwrap().announcements.is_empty());
    }

    #[test]
    fn test_local_hosts_age_out() {
        let (mut table, mut reach) = setup();
        for n in 1..=200 {
            table.learn_local(host(n), 0);
        }
        // refreshed host survives
        table.learn_local(host(1), 900);
        table.announcement_buffer();

        assert_eq!(table.purge_expired(&mut reach, 1_000, 500), 199);
        assert_eq!(table.local_hosts(), vec![host(1)]);
        assert!(table.is_changed());
        let hosts = decode_announcements(table.announcement_buffer());
        assert_eq!(hosts, vec![host(1)]);

        assert_eq!(table.purge_expired(&mut reach, 10_000_000, 500), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_interface_address_never_learned() {
        let (mut table, mut reach) = setup();
        assert!(!table.learn_local(addr(9), 0));
        assert!(table.resolve(&addr(9)).is_none());
        assert!(!table.is_changed());
        assert_eq!(table.purge_expired(&mut reach, 10_000_000, 500), 0);
    }

    #[test]
    fn test_remove_owner() {
        let (mut table, mut reach) = setup();
        table.apply_remote(&mut reach, addr(1), &[host(1), host(2)], 0);
        table.apply_remote(&mut reach, addr(2), &[host(3)], 0);
        assert_eq!(table.remove_owner(addr(1)), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_buffer_truncated_to_packet_space() {
        // room for two hosts after the routing header
        let mut table = HostAnnouncementTable::new(ROUTING_HEADER_LEN + 12 + 5, [addr(9)]);
        for n in 1..=5 {
            table.learn_local(host(n), 0);
        }
        let hosts = decode_announcements(table.announcement_buffer());
        assert_eq!(hosts, vec![host(1), host(2)]);
    }
}
