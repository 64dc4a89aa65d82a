//! Kademlia overlay node: `k`-buckets, blackset, bounded-α iterative
//! lookup (spec.md §4.6). Bounded parallelism is authoritative, per
//! SPEC_FULL.md's Open Question (ii) -- no "strict parallelism" variant.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use async_trait::async_trait;

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::ids::{bucket_index, hash_identity, xor_distance, Id};
use crate::location::Coord;
use crate::node::base::{self, NodeBase};
use crate::node::dht::{self, Overlay};
use crate::node::{HasBase, World};
use crate::packet::{Message, NodeId, Packet};

pub struct KademliaNode {
    base: NodeBase<KademliaNode>,
    pub node_id: Id,
    pub k: usize,
    pub alpha: usize,
    pub buckets: Vec<VecDeque<NodeId>>,
    pub blackset: HashSet<NodeId>,
    ht: HashMap<Id, String>,
}

impl KademliaNode {
    pub fn new(world: Rc<World<KademliaNode>>, id: NodeId, name: String, location: Coord, cfg: &SimConfig) -> Self {
        let node_id = hash_identity(&name, None, cfg.id_bits);
        KademliaNode {
            base: NodeBase::new(world, id, name, location, cfg.capacity, cfg.mean_service_time, cfg.max_timeout),
            node_id,
            k: cfg.k,
            alpha: cfg.alpha,
            buckets: vec![VecDeque::new(); cfg.id_bits as usize],
            blackset: HashSet::new(),
            ht: HashMap::new(),
        }
    }
}

impl HasBase for KademliaNode {
    fn base(&self) -> &NodeBase<Self> {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase<Self> {
        &mut self.base
    }
}

/// Bucket discipline on any observed activity from `peer` (spec.md §4.6,
/// "Bucket discipline"): LRU-on-touch, capped at `k`, eviction without a
/// liveness ping.
fn touch_peer(world: &World<KademliaNode>, id: NodeId, peer: NodeId) {
    if peer == id {
        return;
    }
    let peer_id = world.arena.get(peer).borrow().node_id;
    let node = world.arena.get(id);
    let mut n = node.borrow_mut();
    let self_id = n.node_id;
    let idx = bucket_index(xor_distance(self_id, peer_id));
    n.blackset.remove(&peer);
    let k = n.k;
    let bucket = &mut n.buckets[idx];
    if let Some(pos) = bucket.iter().position(|&p| p == peer) {
        bucket.remove(pos);
        bucket.push_back(peer);
    } else if bucket.len() < k {
        bucket.push_back(peer);
    } else {
        bucket.pop_front();
        bucket.push_back(peer);
    }
}

/// Removes `peer` from its bucket and adds it to the blackset (spec.md
/// §4.6, "On timeout: purge the non-responder from its bucket; add to
/// blackset").
fn purge_and_blacklist(world: &World<KademliaNode>, id: NodeId, peer: NodeId) {
    let node = world.arena.get(id);
    let mut n = node.borrow_mut();
    for bucket in n.buckets.iter_mut() {
        bucket.retain(|&p| p != peer);
    }
    n.blackset.insert(peer);
}

/// The local `k` peers closest to `key` (by XOR distance), excluding the
/// blackset.
fn closest_k(world: &World<KademliaNode>, id: NodeId, key: Id, k: usize) -> Vec<NodeId> {
    let node = world.arena.get(id);
    let n = node.borrow();
    let mut all: Vec<NodeId> = n.buckets.iter().flatten().copied().filter(|p| !n.blackset.contains(p)).collect();
    drop(n);
    all.sort_by_key(|&p| xor_distance(world.arena.get(p).borrow().node_id, key));
    all.truncate(k);
    all
}

/// Walks outward from `key`'s target bucket, alternating nearer/farther,
/// collecting up to `limit` non-blacklisted peers in bucket-insertion order
/// (spec.md §4.6, "Neighbour picker").
fn neighbour_picker(world: &World<KademliaNode>, id: NodeId, key: Id, limit: usize) -> Vec<NodeId> {
    let node = world.arena.get(id);
    let n = node.borrow();
    let target = bucket_index(xor_distance(n.node_id, key)).min(n.buckets.len().saturating_sub(1));
    let num_buckets = n.buckets.len();
    let mut result = Vec::new();
    let mut push_bucket = |idx: usize, result: &mut Vec<NodeId>| {
        for &p in n.buckets[idx].iter() {
            if !n.blackset.contains(&p) {
                result.push(p);
            }
        }
    };
    push_bucket(target, &mut result);
    let mut lower = target as i64 - 1;
    let mut upper = target + 1;
    while result.len() < limit && (lower >= 0 || upper < num_buckets) {
        if lower >= 0 {
            push_bucket(lower as usize, &mut result);
            lower -= 1;
        }
        if upper < num_buckets {
            push_bucket(upper, &mut result);
            upper += 1;
        }
    }
    result.truncate(limit);
    result
}

/// Bounded-α iterative lookup (spec.md §4.6, "Iterative find_node (bounded
/// parallelism)").
async fn find_node_kad(world: Rc<World<KademliaNode>>, id: NodeId, key: Id) -> (Vec<NodeId>, i64) {
    let (alpha, k) = {
        let node = world.arena.get(id);
        let n = node.borrow();
        (n.alpha, n.k)
    };
    let mut current = closest_k(&world, id, key, k);
    let mut contacted: HashSet<NodeId> = HashSet::new();
    contacted.insert(id);

    type PendingReply = Pin<Box<dyn Future<Output = SimResult<Packet>>>>;
    let mut active: Vec<PendingReply> = Vec::new();
    let mut active_peers: Vec<NodeId> = Vec::new();
    let mut hops = 0i64;

    loop {
        let slots = alpha.saturating_sub(active.len());
        for _ in 0..slots {
            let next_peer = current.iter().find(|p| !contacted.contains(p)).copied();
            let peer = match next_peer {
                Some(peer) => peer,
                None => break,
            };
            contacted.insert(peer);
            let w = world.clone();
            let fut: PendingReply = Box::pin(async move {
                let h = base::send_req(&w, id, peer, Message::GetNode { key, index: None });
                base::wait_resp(w, id, h).await
            });
            active.push(fut);
            active_peers.push(peer);
        }

        if active.is_empty() {
            break;
        }

        let (result, idx, rest) = futures::future::select_all(active).await;
        active = rest;
        let peer = active_peers.remove(idx);
        hops += 1;

        match result {
            Ok(Packet { message: Message::GetNodeReply { nodes, .. }, .. }) => {
                for &n in &nodes {
                    touch_peer(&world, id, n);
                }
                let before = current.clone();
                current.extend(nodes);
                current.sort_by_key(|&c| xor_distance(world.arena.get(c).borrow().node_id, key));
                current.dedup();
                current.truncate(k);
                let unchanged = current == before;
                let all_top_k_contacted = current.iter().all(|c| contacted.contains(c));
                if unchanged && all_top_k_contacted && active.is_empty() {
                    break;
                }
            }
            _ => {
                purge_and_blacklist(&world, id, peer);
            }
        }
    }

    for &p in &current {
        touch_peer(&world, id, p);
    }
    (current, hops)
}

/// Inserts `bootstrap` into local buckets, then runs a self-lookup to
/// populate buckets with nearby peers (spec.md §4.6, "join_network").
pub async fn join_network(world: Rc<World<KademliaNode>>, id: NodeId, bootstrap: NodeId) -> bool {
    touch_peer(&world, id, bootstrap);
    let self_key = world.arena.get(id).borrow().node_id;
    let (nodes, _hops) = find_node_kad(world.clone(), id, self_key).await;
    !nodes.is_empty()
}

/// Mutual bucket insertion for the hardwired bootstrap pair (spec.md §4.7,
/// "Creation").
pub fn hardwire_pair(world: &World<KademliaNode>, a: NodeId, b: NodeId) {
    touch_peer(world, a, b);
    touch_peer(world, b, a);
}

/// Spawns the node's receive loop. Kademlia has no periodic maintenance
/// loop analogous to Chord's stabilise/fix-fingers -- bucket health is
/// entirely activity-driven (spec.md §4.6).
pub fn spawn_background_tasks(world: Rc<World<KademliaNode>>, id: NodeId) {
    dht::spawn_receive_loop(world, id);
}

#[async_trait(?Send)]
impl Overlay for KademliaNode {
    fn ht(&self) -> &HashMap<Id, String> {
        &self.ht
    }
    fn ht_mut(&mut self) -> &mut HashMap<Id, String> {
        &mut self.ht
    }

    fn on_sender_seen(world: &World<Self>, id: NodeId, sender: NodeId) {
        touch_peer(world, id, sender);
    }

    async fn manage_packet(world: Rc<World<Self>>, id: NodeId, packet: Packet) {
        let sender = packet.sender;
        let correlation = packet.correlation;
        if let Message::GetNode { key, .. } = packet.message {
            let k = world.arena.get(id).borrow().k;
            let nodes = neighbour_picker(&world, id, key, k);
            if let Some(c) = correlation {
                base::send_resp(&world, id, sender, c, Message::GetNodeReply { nodes, index: None });
            }
        }
    }

    async fn find_node(world: Rc<World<Self>>, id: NodeId, key: Id) -> (Vec<NodeId>, i64) {
        find_node_kad(world, id, key).await
    }
}
