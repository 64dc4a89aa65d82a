//! Boundary properties from spec.md §8.

mod support;

use std::cell::RefCell;
use std::rc::Rc;

use dht_sim::chord::node as chord_node;
use dht_sim::chord::ChordNode;
use dht_sim::client::{run_client_request, ClientAction};
use dht_sim::ids::Id;
use dht_sim::kernel::Kernel;
use dht_sim::net::NetManager;
use dht_sim::node::dht;
use dht_sim::node::{HasBase, World};
use dht_sim::packet::NodeId;
use dht_sim::rng::RandomSource;
use dht_sim::SimulatorDriver;

/// With nodes=2, a client request against the hardwired pair completes
/// without any find_node hops.
#[test]
fn two_node_client_requests_never_hop() {
    let mut cfg = support::chord_config(2, 2);
    cfg.max_time = 20.0;
    cfg.rate = 20.0;
    // Isolate the hop-count invariant from churn noise -- a crashed peer
    // would make some requests time out instead of completing, which is a
    // different property (see `request_against_isolated_node_times_out`).
    cfg.crashrate = 0.0;
    cfg.joinrate = 0.0;

    let collector = SimulatorDriver::<ChordNode>::new(cfg).run();
    assert!(!collector.client_requests.is_empty(), "expected at least one completed client request");
    for record in &collector.client_requests {
        assert_eq!(record.hops, 0);
    }
}

/// With crashrate=0, joinrate=0, the healthy-node count equals `nodes` at
/// every time.
#[test]
fn zero_churn_keeps_every_node_healthy() {
    let mut cfg = support::chord_config(6, 1);
    cfg.crashrate = 0.0;
    cfg.joinrate = 0.0;
    let kernel = Rc::new(Kernel::new());
    let world = Rc::new(World::<ChordNode>::new(kernel, RandomSource::new(cfg.seed), cfg.clone()));
    let net = Rc::new(NetManager::new(world.clone()));
    net.create_bootstrap_population();
    for id in net.nodes() {
        net.schedule_crash(id); // crashrate == 0.0: a documented no-op
    }

    world.kernel.run_until(500.0);
    assert_eq!(net.healthy_count(), cfg.nodes);
}

/// With all but one node crashed, any client request fails (timeout) after
/// at most one client timeout interval.
#[test]
fn request_against_isolated_node_times_out() {
    let cfg = support::chord_config(2, 1);
    let kernel = Rc::new(Kernel::new());
    let world = Rc::new(World::<ChordNode>::new(kernel, RandomSource::new(cfg.seed), cfg.clone()));

    let a_id = world.arena.push(Rc::new(RefCell::new(ChordNode::new(
        world.clone(),
        NodeId(0),
        "a".into(),
        (0.0, 0.0),
        &cfg,
    ))));
    let b_id = world.arena.push(Rc::new(RefCell::new(ChordNode::new(
        world.clone(),
        NodeId(1),
        "b".into(),
        (0.0, 0.0),
        &cfg,
    ))));
    chord_node::hardwire_pair(&world, a_id, b_id);
    world.arena.get(a_id).borrow_mut().base_mut().crashed = true;
    // Force B to route to the crashed peer A first, by making A's identity
    // exactly equal to the lookup key.
    world.arena.get(b_id).borrow_mut().ids[0] = Id(1000);
    world.arena.get(a_id).borrow_mut().ids[0] = Id(0);
    dht::spawn_receive_loop(world.clone(), a_id);

    let key = Id(0);
    let w = world.clone();
    world.kernel.clone().spawn(async move {
        run_client_request(w, b_id, ClientAction::Find, key, String::new()).await;
    });
    world.kernel.run();

    let collector = world.collector.borrow();
    assert_eq!(collector.timed_out_requests.len(), 1);
    assert!(collector.client_requests.is_empty());
    let client_timeout = cfg.client_timeout_multiplier * cfg.max_timeout;
    assert!(world.kernel.now() <= client_timeout + 1e-6);
}
