// Integration tests for multi-node convergence
//
// Several engines share a simulated broadcast medium. Time advances in 10ms
// steps; every transmission reaches all nodes linked to the sender within
// the same step.

use std::collections::HashSet;
use std::sync::Arc;
use tqmesh_core::routing::Owner;
use tqmesh_core::{
    Action, EngineConfig, IfaceId, LinkAddr, LocalInterface, MeshEngine, RouteTable,
};

const STEP_MS: u64 = 10;

fn node_addr(index: usize) -> LinkAddr {
    LinkAddr([2, 0, 0, 0, 0, index as u8 + 1])
}

struct SimNode {
    engine: MeshEngine,
    routes: RouteTable,
    delivered: Vec<Vec<u8>>,
}

struct Mesh {
    nodes: Vec<SimNode>,
    links: HashSet<(usize, usize)>,
    now: u64,
}

impl Mesh {
    fn new(count: usize) -> Self {
        Self::with_config(count, EngineConfig::default())
    }

    fn with_config(count: usize, base: EngineConfig) -> Self {
        let nodes = (0..count)
            .map(|i| {
                let routes = RouteTable::new();
                let config = EngineConfig {
                    rng_seed: Some(i as u64 + 1),
                    ..base.clone()
                };
                let mut engine = MeshEngine::new(
                    config,
                    vec![LocalInterface::new(0, format!("mesh{}", i), node_addr(i))],
                    Arc::new(routes.clone()),
                )
                .unwrap();
                engine.start(0);
                SimNode {
                    engine,
                    routes,
                    delivered: Vec::new(),
                }
            })
            .collect();

        Self {
            nodes,
            links: HashSet::new(),
            now: 0,
        }
    }

    fn link(&mut self, a: usize, b: usize) {
        self.links.insert((a.min(b), a.max(b)));
    }

    fn unlink(&mut self, a: usize, b: usize) {
        self.links.remove(&(a.min(b), a.max(b)));
    }

    fn linked(&self, a: usize, b: usize) -> bool {
        self.links.contains(&(a.min(b), a.max(b)))
    }

    fn run_for(&mut self, duration_ms: u64) {
        let end = self.now + duration_ms;
        while self.now < end {
            self.now += STEP_MS;
            for node in &mut self.nodes {
                node.engine.poll(self.now);
            }
            self.exchange();
        }
    }

    /// Deliver every pending action until the medium is quiet
    fn exchange(&mut self) {
        loop {
            let mut pending = Vec::new();
            for (i, node) in self.nodes.iter_mut().enumerate() {
                for action in node.engine.drain_actions() {
                    pending.push((i, action));
                }
            }
            if pending.is_empty() {
                return;
            }

            for (from, action) in pending {
                match action {
                    Action::Transmit(t) => {
                        for to in 0..self.nodes.len() {
                            if to == from || !self.linked(from, to) {
                                continue;
                            }
                            if t.dest.is_broadcast() || t.dest == node_addr(to) {
                                self.nodes[to].engine.handle_packet(
                                    &t.payload,
                                    node_addr(from),
                                    IfaceId(0),
                                    self.now,
                                );
                            }
                        }
                    }
                    Action::Deliver(frame) => self.nodes[from].delivered.push(frame),
                }
            }
        }
    }

    fn next_hop(&self, from: usize, to: usize) -> Option<LinkAddr> {
        self.nodes[from]
            .routes
            .lookup(&node_addr(to))
            .map(|hop| hop.addr)
    }
}

fn ethernet_frame(dest: LinkAddr, source: LinkAddr, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(dest.as_bytes());
    frame.extend_from_slice(source.as_bytes());
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

#[test]
fn test_two_nodes_become_bidirectional() {
    let mut mesh = Mesh::new(2);
    mesh.link(0, 1);
    mesh.run_for(10_000);

    assert_eq!(mesh.next_hop(0, 1), Some(node_addr(1)));
    assert_eq!(mesh.next_hop(1, 0), Some(node_addr(0)));

    let entry = mesh.nodes[0].engine.reachability().get(&node_addr(1)).unwrap();
    assert!(entry.tq_local > 0);
    assert!(entry.own_broadcast_count(IfaceId(0)) > 0);

    println!("✓ Two linked nodes install direct routes to each other");
}

#[test]
fn test_line_converges_through_middle_node() {
    let mut mesh = Mesh::new(3);
    mesh.link(0, 1);
    mesh.link(1, 2);
    mesh.run_for(20_000);

    assert_eq!(mesh.next_hop(0, 1), Some(node_addr(1)));
    assert_eq!(mesh.next_hop(0, 2), Some(node_addr(1)));
    assert_eq!(mesh.next_hop(2, 0), Some(node_addr(1)));
    assert_eq!(mesh.next_hop(1, 0), Some(node_addr(0)));
    assert_eq!(mesh.next_hop(1, 2), Some(node_addr(2)));

    // two-hop quality is lower than one-hop quality
    let reach = mesh.nodes[0].engine.reachability();
    let direct = reach.get(&node_addr(1)).unwrap().best_route().unwrap().quality_average();
    let via = reach.get(&node_addr(2)).unwrap().best_route().unwrap().quality_average();
    assert!(via > 0);
    assert!(via < direct);

    println!("✓ A-B-C line: A reaches C via B (quality {} < {})", via, direct);
}

#[test]
fn test_lost_link_purges_route() {
    let config = EngineConfig {
        purge_timeout_ms: 10_000,
        ..Default::default()
    };
    let mut mesh = Mesh::with_config(3, config);
    mesh.link(0, 1);
    mesh.link(1, 2);
    mesh.run_for(20_000);
    assert_eq!(mesh.next_hop(0, 2), Some(node_addr(1)));

    mesh.unlink(1, 2);
    mesh.run_for(30_000);

    assert_eq!(mesh.next_hop(0, 2), None);
    assert!(mesh.nodes[0].engine.reachability().get(&node_addr(2)).is_none());
    assert_eq!(mesh.next_hop(0, 1), Some(node_addr(1)));

    println!("✓ Route to C disappears after the B-C link breaks");
}

#[test]
fn test_failover_to_alternate_path() {
    let config = EngineConfig {
        purge_timeout_ms: 10_000,
        ..Default::default()
    };
    // diamond: 0-1-3 and 0-2-3
    let mut mesh = Mesh::with_config(4, config);
    mesh.link(0, 1);
    mesh.link(1, 3);
    mesh.link(0, 2);
    mesh.link(2, 3);
    mesh.run_for(20_000);

    let first = mesh.next_hop(0, 3).unwrap();
    assert!(first == node_addr(1) || first == node_addr(2));

    let (used, other) = if first == node_addr(1) { (1, 2) } else { (2, 1) };
    mesh.unlink(used, 3);
    mesh.run_for(30_000);

    assert_eq!(mesh.next_hop(0, 3), Some(node_addr(other)));

    println!("✓ Route to D fails over from {} to {}", first, node_addr(other));
}

#[test]
fn test_bridged_hosts_reach_each_other() {
    let mut mesh = Mesh::new(3);
    mesh.link(0, 1);
    mesh.link(1, 2);
    mesh.run_for(15_000);

    let host_a = LinkAddr([0x0a, 0, 0, 0, 0, 1]);
    let host_c = LinkAddr([0x0a, 0, 0, 0, 0, 3]);

    // host behind C says hello to everyone
    let hello = ethernet_frame(LinkAddr::BROADCAST, host_c, b"hello");
    mesh.nodes[2].engine.handle_local_frame(&hello, mesh.now);
    mesh.exchange();
    assert!(mesh.nodes[0].delivered.contains(&hello));
    assert!(mesh.nodes[1].delivered.contains(&hello));
    assert!(!mesh.nodes[2].delivered.contains(&hello));

    // C announces the host in its next broadcasts
    mesh.run_for(3_000);
    assert_eq!(
        mesh.nodes[0].engine.announcements().resolve(&host_c),
        Some(Owner::Remote(node_addr(2)))
    );

    let reply = ethernet_frame(host_c, host_a, b"reply");
    mesh.nodes[0].engine.handle_local_frame(&reply, mesh.now);
    mesh.exchange();
    assert_eq!(mesh.nodes[2].delivered.last(), Some(&reply));
    assert!(!mesh.nodes[1].delivered.contains(&reply));

    println!("✓ Bridged frame from A reaches the host behind C");
}
