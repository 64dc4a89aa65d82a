//! The client actor (spec.md §4.9): a short-lived task that issues one
//! `FIND_VALUE` or `STORE_VALUE` request against a random node and records
//! its outcome.

use std::rc::Rc;

use crate::ids::Id;
use crate::kernel::wait::{any_of, sleep, Race};
use crate::node::dht::Overlay;
use crate::node::World;
use crate::packet::NodeId;

/// Which request a client fires, chosen uniformly per spec.md §4.8 ("a
/// random action (`FIND` or `STORE`)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Find,
    Store,
}

/// Runs one client request against `target`, entering the overlay directly
/// at that node (a client is not itself an addressable node; it drives
/// `find_value`/`store_value` on the node it picked, the same call a peer's
/// own `FIND_VALUE`/`STORE_VALUE` handler would make -- spec.md §4.9).
pub async fn run_client_request<N: Overlay>(
    world: Rc<World<N>>,
    target: NodeId,
    action: ClientAction,
    key: Id,
    value: String,
) {
    let start_time = world.kernel.now();
    let max_timeout = world.arena.get(target).borrow().base().max_timeout;
    let client_timeout = world.config.client_timeout_multiplier * max_timeout;
    let timeout = sleep(world.kernel.clone(), client_timeout);

    match action {
        ClientAction::Find => {
            let op = N::find_value(world.clone(), target, key);
            match any_of(op, timeout).await {
                Race::Left((got, hops)) => record_find_outcome(&world, start_time, key, hops, got),
                Race::Right(()) => world.collector.borrow_mut().record_timed_out(start_time),
            }
        }
        ClientAction::Store => {
            let op = N::store_value(world.clone(), target, key, value.clone());
            match any_of(op, timeout).await {
                Race::Left(hops) => record_store_outcome(&world, start_time, key, hops, value),
                Race::Right(()) => world.collector.borrow_mut().record_timed_out(start_time),
            }
        }
    }
}

/// `FIND_VALUE`'s outcome goes only to `returned_value` (spec.md §6: "FIND
/// results" vs. `STORE_VALUE`'s "STORE inputs") --
/// `examples/original_source/src/common/client.py`'s `find_value` and
/// `store_value` append to exactly one of the two arrays each, never both.
fn record_find_outcome<N>(world: &Rc<World<N>>, start_time: f64, key: Id, hops: i64, value: Option<String>) {
    if hops == -1 {
        world.collector.borrow_mut().record_timed_out(start_time);
        return;
    }
    let latency = world.kernel.now() - start_time;
    world.collector.borrow_mut().record_client_success(start_time, latency, hops);
    world.collector.borrow_mut().record_returned_value(start_time, key, value);
}

fn record_store_outcome<N>(world: &Rc<World<N>>, start_time: f64, key: Id, hops: i64, value: String) {
    if hops == -1 {
        world.collector.borrow_mut().record_timed_out(start_time);
        return;
    }
    let latency = world.kernel.now() - start_time;
    world.collector.borrow_mut().record_client_success(start_time, latency, hops);
    world.collector.borrow_mut().record_true_value(start_time, key, Some(value));
}
