//! The node runtime: the arena every overlay node lives in, and the shared
//! simulation context ("world") every node task carries a handle to.
//!
//! Design Notes (spec.md §9) ask for "an arena of nodes + stable indices...
//! so finger and bucket entries are plain keys, not raw references" instead
//! of cyclic `Rc`/`Weak` webs between peers. `Arena<N>` is that arena:
//! finger-table and k-bucket entries are `NodeId`s, resolved through the
//! arena only when a message actually needs to be sent.

pub mod base;
pub mod dht;

use std::cell::RefCell;
use std::rc::Rc;

use crate::collector::DataCollector;
use crate::config::SimConfig;
use crate::kernel::KernelHandle;
use crate::location::LocationService;
use crate::packet::NodeId;
use crate::rng::RandomSource;

/// Stable storage for every node created during a run. Nodes are never
/// removed on crash -- they are marked `crashed` in place, per spec.md §3
/// ("still has its data structures in memory").
pub struct Arena<N> {
    nodes: RefCell<Vec<Rc<RefCell<N>>>>,
}

impl<N> Arena<N> {
    pub fn new() -> Self {
        Arena {
            nodes: RefCell::new(Vec::new()),
        }
    }

    pub fn push(&self, node: Rc<RefCell<N>>) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Rc<RefCell<N>> {
        self.nodes.borrow()[id.0].clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        (0..self.len()).map(NodeId).collect()
    }
}

impl<N> Default for Arena<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a node task needs: the arena it can address peers through, the
/// kernel it suspends on, the shared RNG and trace collector, the location
/// table, and the run's resolved configuration. Always held as `Rc<World<N>>`
/// so every spawned task can cheaply clone a handle to it.
pub struct World<N> {
    pub kernel: KernelHandle,
    pub arena: Arena<N>,
    pub rng: RefCell<RandomSource>,
    pub collector: RefCell<DataCollector>,
    pub location: LocationService,
    pub config: SimConfig,
}

impl<N> World<N> {
    pub fn new(kernel: KernelHandle, rng: RandomSource, config: SimConfig) -> Self {
        World {
            kernel,
            arena: Arena::new(),
            rng: RefCell::new(rng),
            collector: RefCell::new(DataCollector::new()),
            location: LocationService,
            config,
        }
    }
}

/// Any concrete overlay node type embeds a `NodeBase` and exposes it
/// uniformly, so the generic node-runtime code (receive loop, send/wait
/// helpers) never needs to know whether it is driving a `ChordNode` or a
/// `KademliaNode`.
pub trait HasBase: Sized {
    fn base(&self) -> &base::NodeBase<Self>;
    fn base_mut(&mut self) -> &mut base::NodeBase<Self>;
}
