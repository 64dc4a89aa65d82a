//! Net manager (spec.md §4.7): builds the bootstrap population, tracks the
//! healthy set, and schedules churn (crashes and joins) for nodes already in
//! the arena.

use std::cell::RefCell;
use std::rc::Rc;

use crate::chord::ChordNode;
use crate::config::SimConfig;
use crate::kad::KademliaNode;
use crate::location::LocationService;
use crate::node::dht::Overlay;
use crate::node::{HasBase, World};
use crate::packet::NodeId;

/// Builds one node of overlay type `N`, hands it its background tasks, and
/// returns its arena id. Kept as a free function (rather than a trait
/// method on `Overlay`) because the two overlays' constructors take
/// different extra arguments (none, so far) but are otherwise
/// identically-shaped -- a small seam left open for future overlay kinds.
#[async_trait::async_trait(?Send)]
pub trait NodeFactory: Overlay {
    fn build(world: Rc<World<Self>>, id: NodeId, name: String, cfg: &SimConfig) -> Self;
    fn hardwire(world: &World<Self>, a: NodeId, b: NodeId);
    fn spawn_background_tasks(world: Rc<World<Self>>, id: NodeId);
    async fn join_network(world: Rc<World<Self>>, id: NodeId, bootstrap: NodeId) -> bool;
}

#[async_trait::async_trait(?Send)]
impl NodeFactory for ChordNode {
    fn build(world: Rc<World<Self>>, id: NodeId, name: String, cfg: &SimConfig) -> Self {
        let location = LocationService::location_for_index(id.0);
        ChordNode::new(world, id, name, location, cfg)
    }
    fn hardwire(world: &World<Self>, a: NodeId, b: NodeId) {
        crate::chord::node::hardwire_pair(world, a, b);
    }
    fn spawn_background_tasks(world: Rc<World<Self>>, id: NodeId) {
        crate::chord::node::spawn_background_tasks(world, id);
    }
    async fn join_network(world: Rc<World<Self>>, id: NodeId, bootstrap: NodeId) -> bool {
        crate::chord::node::join_network(world, id, bootstrap).await
    }
}

#[async_trait::async_trait(?Send)]
impl NodeFactory for KademliaNode {
    fn build(world: Rc<World<Self>>, id: NodeId, name: String, cfg: &SimConfig) -> Self {
        let location = LocationService::location_for_index(id.0);
        KademliaNode::new(world, id, name, location, cfg)
    }
    fn hardwire(world: &World<Self>, a: NodeId, b: NodeId) {
        crate::kad::node::hardwire_pair(world, a, b);
    }
    fn spawn_background_tasks(world: Rc<World<Self>>, id: NodeId) {
        crate::kad::node::spawn_background_tasks(world, id);
    }
    async fn join_network(world: Rc<World<Self>>, id: NodeId, bootstrap: NodeId) -> bool {
        crate::kad::node::join_network(world, id, bootstrap).await
    }
}

/// Tracks every node created during a run plus which of them are currently
/// healthy (non-crashed), and schedules the churn events that move nodes
/// between the two (spec.md §4.7).
pub struct NetManager<N> {
    world: Rc<World<N>>,
    nodes: RefCell<Vec<NodeId>>,
    healthy: RefCell<Vec<NodeId>>,
    next_index: RefCell<usize>,
}

impl<N: NodeFactory + HasBase> NetManager<N> {
    pub fn new(world: Rc<World<N>>) -> Self {
        NetManager {
            world,
            nodes: RefCell::new(Vec::new()),
            healthy: RefCell::new(Vec::new()),
            next_index: RefCell::new(0),
        }
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.borrow().clone()
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy.borrow().len()
    }

    /// Creates one fresh node with the next sequential name (`node-{i}`),
    /// pushes it into the arena, starts its background tasks, and records it
    /// in both the full and healthy sets. Does not join it to anything --
    /// callers decide hardwiring vs. joining.
    fn create_node(&self) -> NodeId {
        let cfg = self.world.config.clone();
        let index = {
            let mut next = self.next_index.borrow_mut();
            let i = *next;
            *next += 1;
            i
        };
        let name = format!("node-{index}");
        let id = self.world.arena.push(Rc::new(RefCell::new(N::build(
            self.world.clone(),
            NodeId(self.world.arena.len()),
            name,
            &cfg,
        ))));
        N::spawn_background_tasks(self.world.clone(), id);
        self.nodes.borrow_mut().push(id);
        self.healthy.borrow_mut().push(id);
        id
    }

    /// Builds the `n` bootstrap nodes and hardwires the first two as mutual
    /// neighbours (spec.md §4.7, "Creation"). The remaining `n - 2` nodes are
    /// left unjoined for the driver's build phase to join sequentially.
    pub fn create_bootstrap_population(&self) {
        let n = self.world.config.nodes;
        for _ in 0..n {
            self.create_node();
        }
        let nodes = self.nodes.borrow();
        if nodes.len() >= 2 {
            N::hardwire(&self.world, nodes[0], nodes[1]);
            self.world.collector.borrow_mut().record_joined(&self.node_name(nodes[0]), 0.0);
            self.world.collector.borrow_mut().record_joined(&self.node_name(nodes[1]), 0.0);
        }
    }

    fn node_name(&self, id: NodeId) -> String {
        self.world.arena.get(id).borrow().base().name.clone()
    }

    /// Picks a uniformly random healthy node, or `None` if none remain.
    pub fn get_healthy_node(&self) -> Option<NodeId> {
        let healthy = self.healthy.borrow();
        self.world.rng.borrow_mut().choose(&healthy).copied()
    }

    /// Schedules `node`'s crash: after a lognormal wait scaled by
    /// `1 / crash_rate`, if more than 2 healthy nodes would remain, mark it
    /// crashed and drop it from the healthy set (spec.md §4.7: at least 2
    /// healthy nodes must remain after the crash, so the guard requires
    /// strictly more than 2 beforehand). A `crash_rate` of 0 disables
    /// crashes for this node entirely.
    pub fn schedule_crash(self: &Rc<Self>, node: NodeId) {
        let crash_rate = self.world.config.crashrate;
        if crash_rate <= 0.0 {
            return;
        }
        let mean = self.world.config.crash_lognormal_mean / crash_rate;
        let sigma = self.world.config.crash_lognormal_sigma;
        let wait = self.world.rng.borrow_mut().lognormal(mean, sigma);
        let mgr = self.clone();
        self.world.kernel.schedule_after(wait, move |_k| {
            if mgr.healthy.borrow().len() <= 2 {
                return;
            }
            {
                let world = mgr.world.clone();
                let mut n = world.arena.get(node).borrow_mut();
                n.base_mut().crashed = true;
            }
            mgr.healthy.borrow_mut().retain(|&id| id != node);
            let now = mgr.world.kernel.now();
            let name = mgr.node_name(node);
            mgr.world.collector.borrow_mut().record_crashed(&name, now);
        });
    }

    /// Creates a fresh node, picks a random healthy bootstrap peer, and
    /// attempts to join it to the network. On success, records its join
    /// time and arms its own crash; on failure, records `failed_to_join` and
    /// leaves the node out of the healthy set (spec.md §4.7, "Join
    /// scheduling").
    pub async fn join_next(self: &Rc<Self>) {
        let bootstrap = match self.get_healthy_node() {
            Some(b) => b,
            None => return,
        };
        let id = self.create_node();
        // `create_node` optimistically marks the node healthy; undo that
        // until the join actually succeeds.
        self.healthy.borrow_mut().retain(|&n| n != id);

        let ok = N::join_network(self.world.clone(), id, bootstrap).await;
        let now = self.world.kernel.now();
        if ok {
            self.healthy.borrow_mut().push(id);
            let name = self.node_name(id);
            self.world.collector.borrow_mut().record_joined(&name, now);
            self.schedule_crash(id);
        } else {
            self.world.collector.borrow_mut().record_failed_to_join(now);
        }
    }
}
