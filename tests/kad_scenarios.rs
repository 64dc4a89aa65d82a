//! Kademlia-overlay concrete scenario from spec.md §8.

mod support;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dht_sim::ids::Id;
use dht_sim::kad::KademliaNode;
use dht_sim::kernel::Kernel;
use dht_sim::node::dht::{self, Overlay};
use dht_sim::node::{HasBase, World};
use dht_sim::packet::NodeId;
use dht_sim::rng::RandomSource;

fn push_peer(world: &Rc<World<KademliaNode>>, index: usize, name: &str, node_id: u64, cfg: &dht_sim::SimConfig) -> NodeId {
    let id = world.arena.push(Rc::new(RefCell::new(KademliaNode::new(
        world.clone(),
        NodeId(index),
        name.to_string(),
        (0.0, 0.0),
        cfg,
    ))));
    world.arena.get(id).borrow_mut().node_id = Id(node_id);
    id
}

/// Scenario 5: bounded parallelism with timeout. alpha=2, k=4; one of the
/// two first responders crashes silently. The lookup round completes once
/// the second responder arrives plus the next dispatch fills in a third;
/// after completion, the crashed peer is in the blackset.
#[test]
fn crashed_first_responder_ends_up_blacklisted() {
    let cfg = support::kad_config(5, 4, 2);
    let kernel = Rc::new(Kernel::new());
    let world = Rc::new(World::<KademliaNode>::new(kernel, RandomSource::new(cfg.seed), cfg.clone()));

    // Distances to key=0 are just the peers' own ids, so closest_k's sort
    // order is exactly p1 < p2 < p3 < p4.
    let q_id = push_peer(&world, 0, "q", 0, &cfg);
    let p1_id = push_peer(&world, 1, "p1", 1, &cfg);
    let p2_id = push_peer(&world, 2, "p2", 2, &cfg);
    let p3_id = push_peer(&world, 3, "p3", 3, &cfg);
    let p4_id = push_peer(&world, 4, "p4", 4, &cfg);
    let key = Id(0);

    world.arena.get(p1_id).borrow_mut().base_mut().crashed = true;

    {
        let q = world.arena.get(q_id);
        let mut q = q.borrow_mut();
        q.buckets[0] = VecDeque::from([p1_id, p2_id, p3_id, p4_id]);
    }

    for &id in &[q_id, p1_id, p2_id, p3_id, p4_id] {
        dht::spawn_receive_loop(world.clone(), id);
    }

    let result: Rc<RefCell<Option<(Vec<NodeId>, i64)>>> = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    let w = world.clone();
    world.kernel.clone().spawn(async move {
        let r = KademliaNode::find_node(w, q_id, key).await;
        *result2.borrow_mut() = Some(r);
    });
    world.kernel.run();

    let (_found, hops) = result.borrow().clone().expect("lookup task completed");
    assert!(hops >= 3, "expected at least p2, p3, p4 plus p1's timeout: got {hops}");
    assert!(world.arena.get(q_id).borrow().blackset.contains(&p1_id));
    assert!(!world.arena.get(q_id).borrow().buckets[0].contains(&p1_id));
}
