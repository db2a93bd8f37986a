//! Route selection
//!
//! The best next hop towards an originator is the neighbour record with the
//! highest rolling quality average. On an exact tie the installed route is
//! kept, so equal alternatives never cause flapping.
//!
//! Installed routes are reported through [`RouteObserver`]; [`RouteTable`] is
//! the shared, thread-safe mirror handed to forwarding code outside the engine.

use super::address::{IfaceId, LinkAddr};
use super::neighbor::NeighborKey;
use super::originator::ReachabilityEntry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Next hop of an installed route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NextHop {
    pub addr: LinkAddr,
    pub iface: IfaceId,
}

impl From<NeighborKey> for NextHop {
    fn from(key: NeighborKey) -> Self {
        Self {
            addr: key.addr,
            iface: key.iface,
        }
    }
}

/// A route install, switch or removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteChange {
    pub destination: LinkAddr,
    pub previous: Option<NextHop>,
    pub next_hop: Option<NextHop>,
}

/// Receives every route change exactly once, from the engine's thread
pub trait RouteObserver: Send + Sync {
    fn on_route_changed(&self, destination: LinkAddr, next_hop: Option<NextHop>);
}

/// Best neighbour of `entry` under the tie-keeping rule.
///
/// Records whose average is still zero have never carried a bidirectional
/// sample and are not eligible.
pub fn best_neighbor(entry: &ReachabilityEntry) -> Option<NeighborKey> {
    let mut best: Option<(NeighborKey, u8)> = None;
    for record in entry.neighbors() {
        let avg = record.quality_average();
        if avg == 0 {
            continue;
        }
        match best {
            Some((_, best_avg)) if avg <= best_avg => {}
            _ => best = Some((record.key(), avg)),
        }
    }

    let (candidate, best_avg) = best?;
    if let Some(current) = entry.best_route() {
        if current.quality_average() == best_avg {
            return Some(current.key());
        }
    }
    Some(candidate)
}

/// Re-run selection on `entry` and install the result.
///
/// Returns the change when the installed route differs afterwards.
pub fn update_route(entry: &mut ReachabilityEntry) -> Option<RouteChange> {
    let previous = entry.best_route_key();
    reselect(entry, previous)
}

/// Re-run selection after the neighbour list changed underneath a route
/// that was `previous` before the change.
pub fn reselect(entry: &mut ReachabilityEntry, previous: Option<NeighborKey>) -> Option<RouteChange> {
    let best = best_neighbor(entry);
    if best == previous {
        return None;
    }

    entry.set_best_route(best);
    let change = RouteChange {
        destination: entry.address(),
        previous: previous.map(NextHop::from),
        next_hop: best.map(NextHop::from),
    };

    match (change.previous, change.next_hop) {
        (None, Some(hop)) => debug!(
            "Adding route to {} via {} ({})",
            change.destination, hop.addr, hop.iface
        ),
        (Some(old), Some(hop)) => debug!(
            "Changing route to {}: {} ({}) -> {} ({})",
            change.destination, old.addr, old.iface, hop.addr, hop.iface
        ),
        (Some(old), None) => debug!(
            "Deleting route to {} via {} ({})",
            change.destination, old.addr, old.iface
        ),
        (None, None) => {}
    }

    Some(change)
}

/// Clear the installed route of an entry that is about to disappear
pub fn remove_route(entry: &mut ReachabilityEntry) -> Option<RouteChange> {
    let previous = entry.best_route_key()?;
    entry.set_best_route(None);
    debug!(
        "Deleting route to {} via {} ({})",
        entry.address(),
        previous.addr,
        previous.iface
    );
    Some(RouteChange {
        destination: entry.address(),
        previous: Some(previous.into()),
        next_hop: None,
    })
}

/// Shared destination -> next hop map kept in sync with the engine
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Arc<RwLock<HashMap<LinkAddr, NextHop>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, destination: &LinkAddr) -> Option<NextHop> {
        self.routes.read().get(destination).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(LinkAddr, NextHop)> {
        let mut routes: Vec<_> = self.routes.read().iter().map(|(d, h)| (*d, *h)).collect();
        routes.sort_by_key(|(d, _)| *d);
        routes
    }
}

impl RouteObserver for RouteTable {
    fn on_route_changed(&self, destination: LinkAddr, next_hop: Option<NextHop>) {
        let mut routes = self.routes.write();
        match next_hop {
            Some(hop) => {
                routes.insert(destination, hop);
            }
            None => {
                routes.remove(&destination);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> LinkAddr {
        LinkAddr([2, 0, 0, 0, 0, n])
    }

    fn entry_with(samples: &[(u8, u8)]) -> ReachabilityEntry {
        let mut entry = ReachabilityEntry::new(addr(100), 1, 0);
        for (n, tq) in samples {
            entry
                .neighbor_or_insert(NeighborKey::new(addr(*n), IfaceId(0)), 0)
                .push_quality_sample(*tq);
        }
        entry
    }

    #[test]
    fn test_highest_average_wins() {
        let mut entry = entry_with(&[(1, 150), (2, 200)]);
        let change = update_route(&mut entry).unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.next_hop.unwrap().addr, addr(2));
        assert!(update_route(&mut entry).is_none());
    }

    #[test]
    fn test_tie_keeps_installed_route() {
        let mut entry = entry_with(&[(1, 180)]);
        update_route(&mut entry);
        entry
            .neighbor_or_insert(NeighborKey::new(addr(2), IfaceId(0)), 0)
            .push_quality_sample(180);

        assert!(update_route(&mut entry).is_none());
        assert_eq!(entry.best_route().unwrap().neighbor_address, addr(1));
    }

    #[test]
    fn test_zero_average_not_routable() {
        let mut entry = ReachabilityEntry::new(addr(100), 1, 0);
        entry.neighbor_or_insert(NeighborKey::new(addr(1), IfaceId(0)), 0);
        assert!(best_neighbor(&entry).is_none());
        assert!(update_route(&mut entry).is_none());
    }

    #[test]
    fn test_reselect_after_neighbor_purge() {
        let mut entry = entry_with(&[(1, 200), (2, 150)]);
        update_route(&mut entry);
        entry.neighbor_mut(&NeighborKey::new(addr(2), IfaceId(0))).unwrap().touch(10_000);

        let previous = entry.best_route_key();
        assert!(entry.purge_neighbors(5_000, 1_000));
        let change = reselect(&mut entry, previous).unwrap();
        assert_eq!(change.previous.unwrap().addr, addr(1));
        assert_eq!(change.next_hop.unwrap().addr, addr(2));
    }

    #[test]
    fn test_remove_route() {
        let mut entry = entry_with(&[(1, 100)]);
        update_route(&mut entry);
        let change = remove_route(&mut entry).unwrap();
        assert_eq!(change.next_hop, None);
        assert_eq!(change.previous.unwrap().addr, addr(1));
        assert!(remove_route(&mut entry).is_none());
    }

    #[test]
    fn test_route_table_mirrors_changes() {
        let table = RouteTable::new();
        let hop = NextHop {
            addr: addr(1),
            iface: IfaceId(0),
        };
        table.on_route_changed(addr(9), Some(hop));
        assert_eq!(table.lookup(&addr(9)), Some(hop));

        let shared = table.clone();
        shared.on_route_changed(addr(9), None);
        assert!(table.is_empty());
    }
}
