//! Gateway list
//!
//! Originators advertising a non-zero gateway class. Selection is a pure
//! function over this list and the reachability table; the engine records the
//! choice but never changes routing state because of it.

use super::address::LinkAddr;
use super::originator::ReachabilityTable;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEntry {
    pub orig: LinkAddr,
    pub gw_class: u8,
    /// Time the gateway stopped advertising or was purged
    pub deleted: Option<u64>,
}

#[derive(Debug, Default)]
pub struct GatewayList {
    entries: Vec<GatewayEntry>,
    current: Option<LinkAddr>,
}

impl GatewayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, orig: &LinkAddr) -> Option<&GatewayEntry> {
        self.entries.iter().find(|g| g.orig == *orig)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GatewayEntry> {
        self.entries.iter()
    }

    /// Gateways not marked deleted
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|g| g.deleted.is_none()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the gateway class carried by `orig`'s latest broadcast
    pub fn update(&mut self, orig: LinkAddr, gw_class: u8, now: u64) {
        match self.entries.iter_mut().find(|g| g.orig == orig) {
            Some(entry) if gw_class == 0 => {
                if entry.deleted.is_none() {
                    info!("Gateway {} removed from gateway list", orig);
                    entry.deleted = Some(now);
                }
            }
            Some(entry) => {
                if entry.deleted.is_some() || entry.gw_class != gw_class {
                    info!("Gateway {} class {} restored", orig, gw_class);
                }
                entry.gw_class = gw_class;
                entry.deleted = None;
            }
            None if gw_class != 0 => {
                info!("Found new gateway {} class {}", orig, gw_class);
                self.entries.push(GatewayEntry {
                    orig,
                    gw_class,
                    deleted: None,
                });
            }
            None => {}
        }
    }

    /// The originator behind a gateway entry is gone
    pub fn mark_deleted(&mut self, orig: &LinkAddr, now: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|g| g.orig == *orig) {
            if entry.deleted.is_none() {
                debug!("Gateway {} deleted with its originator", orig);
                entry.deleted = Some(now);
            }
        }
        if self.current == Some(*orig) {
            self.current = None;
        }
    }

    /// Drop entries deleted longer than `3 * timeout` ago
    pub fn purge_deleted(&mut self, now: u64, timeout: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|g| match g.deleted {
            Some(at) => at.saturating_add(timeout.saturating_mul(3)) >= now,
            None => true,
        });
        before - self.entries.len()
    }

    pub fn current(&self) -> Option<LinkAddr> {
        self.current
    }

    /// Store a selection result; returns true if it differs from the last one
    pub fn set_current(&mut self, choice: Option<LinkAddr>) -> bool {
        if self.current == choice {
            return false;
        }
        match choice {
            Some(gw) => info!("Selected gateway {}", gw),
            None => info!("No gateway selected"),
        }
        self.current = choice;
        true
    }
}

/// Pick the best routed gateway.
///
/// Routing class 0 disables selection; 1 and 2 weight the route quality by
/// the advertised class; 3 uses route quality alone. A preferred gateway wins
/// whenever it is active and routed.
pub fn choose_gateway(
    list: &GatewayList,
    reach: &ReachabilityTable,
    routing_class: u8,
    preferred: Option<LinkAddr>,
) -> Option<LinkAddr> {
    if routing_class == 0 {
        return None;
    }

    let routed_quality = |orig: &LinkAddr| -> Option<u8> {
        reach
            .get(orig)?
            .best_route()
            .map(|n| n.quality_average())
            .filter(|q| *q > 0)
    };

    if let Some(pref) = preferred {
        let active = list.get(&pref).map(|g| g.deleted.is_none()).unwrap_or(false);
        if active && routed_quality(&pref).is_some() {
            return Some(pref);
        }
    }

    let mut best: Option<(LinkAddr, u32)> = None;
    for gw in list.iter().filter(|g| g.deleted.is_none()) {
        let Some(quality) = routed_quality(&gw.orig) else {
            continue;
        };
        let factor = match routing_class {
            1 | 2 => gw.gw_class as u32 * quality as u32,
            _ => quality as u32,
        };
        match best {
            Some((_, best_factor)) if factor <= best_factor => {}
            _ => best = Some((gw.orig, factor)),
        }
    }
    best.map(|(orig, _)| orig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::address::IfaceId;
    use crate::routing::neighbor::NeighborKey;
    use crate::routing::route::update_route;

    fn addr(n: u8) -> LinkAddr {
        LinkAddr([2, 0, 0, 0, 0, n])
    }

    fn routed(reach: &mut ReachabilityTable, orig: LinkAddr, quality: u8) {
        let entry = reach.get_or_create(orig, 0);
        entry
            .neighbor_or_insert(NeighborKey::new(orig, IfaceId(0)), 0)
            .push_quality_sample(quality);
        update_route(entry);
    }

    #[test]
    fn test_update_and_delete() {
        let mut list = GatewayList::new();
        list.update(addr(1), 0, 0);
        assert!(list.is_empty());

        list.update(addr(1), 5, 0);
        assert_eq!(list.active_count(), 1);

        list.update(addr(1), 0, 100);
        assert_eq!(list.get(&addr(1)).unwrap().deleted, Some(100));
        assert_eq!(list.active_count(), 0);

        list.update(addr(1), 3, 200);
        assert_eq!(list.get(&addr(1)).unwrap().deleted, None);
        assert_eq!(list.get(&addr(1)).unwrap().gw_class, 3);
    }

    #[test]
    fn test_purge_after_three_timeouts() {
        let mut list = GatewayList::new();
        list.update(addr(1), 5, 0);
        list.mark_deleted(&addr(1), 1_000);
        assert_eq!(list.purge_deleted(1_000 + 3 * 100, 100), 0);
        assert_eq!(list.purge_deleted(1_000 + 3 * 100 + 1, 100), 1);

        list.update(addr(2), 5, 0);
        list.mark_deleted(&addr(2), 1_000);
        assert_eq!(list.purge_deleted(u64::MAX, u64::MAX), 0);
    }

    #[test]
    fn test_choose_by_class_and_quality() {
        let mut reach = ReachabilityTable::new(1).unwrap();
        let mut list = GatewayList::new();
        routed(&mut reach, addr(1), 200);
        routed(&mut reach, addr(2), 120);
        list.update(addr(1), 1, 0);
        list.update(addr(2), 4, 0);

        assert_eq!(choose_gateway(&list, &reach, 0, None), None);
        // 1*200 vs 4*120
        assert_eq!(choose_gateway(&list, &reach, 1, None), Some(addr(2)));
        assert_eq!(choose_gateway(&list, &reach, 3, None), Some(addr(1)));
        assert_eq!(choose_gateway(&list, &reach, 3, Some(addr(2))), Some(addr(2)));
    }

    #[test]
    fn test_unrouted_and_deleted_gateways_skipped() {
        let mut reach = ReachabilityTable::new(1).unwrap();
        let mut list = GatewayList::new();
        reach.get_or_create(addr(1), 0);
        routed(&mut reach, addr(2), 100);
        list.update(addr(1), 5, 0);
        list.update(addr(2), 5, 0);
        list.mark_deleted(&addr(2), 0);

        assert_eq!(choose_gateway(&list, &reach, 3, Some(addr(1))), None);
    }

    #[test]
    fn test_set_current_reports_changes() {
        let mut list = GatewayList::new();
        assert!(!list.set_current(None));
        assert!(list.set_current(Some(addr(1))));
        assert!(!list.set_current(Some(addr(1))));
        list.mark_deleted(&addr(1), 0);
        assert_eq!(list.current(), None);
    }
}
