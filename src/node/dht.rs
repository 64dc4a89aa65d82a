//! The overlay-generic surface every DHT node type implements, plus the
//! parts of "Node (DHT)" that are common to both Chord and Kademlia
//! (spec.md §3, "Node (DHT)": "Handles `GET_VALUE`/`SET_VALUE` directly...
//! delegates `FIND_VALUE`/`STORE_VALUE` to `find_node`").
//!
//! Only one overlay kind ever runs in a given process (`--dht` picks
//! exactly one), so the driver, net manager, and client are generic over
//! `N: Overlay` and monomorphized rather than built against `dyn Overlay`
//! trait objects -- there is no dynamic-dispatch requirement here, only a
//! shared bound.

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;

use crate::ids::Id;
use crate::packet::{Message, NodeId, Packet};

use super::base::{self, service};
use super::{HasBase, World};

/// Per-overlay behavior: routing (`manage_packet`) and lookup
/// (`find_node`). Both are overlay-specific -- Chord walks the ring via
/// per-identity successors, Kademlia runs an alpha-bounded parallel search
/// over k-buckets -- so both are required methods with no useful default.
#[async_trait(?Send)]
pub trait Overlay: HasBase + Sized + 'static {
    /// Read access to the local key/value store (spec.md §3, "Node (DHT)").
    fn ht(&self) -> &HashMap<Id, String>;
    fn ht_mut(&mut self) -> &mut HashMap<Id, String>;

    /// Threads a message's sender into whatever routing-table bookkeeping
    /// this overlay keeps, before the message is otherwise dispatched
    /// (spec.md §4.6, "Peers arriving in messages are threaded into the
    /// bucket via `process_sender` before the protocol handler runs").
    /// Chord has no such bookkeeping and uses the default no-op.
    fn on_sender_seen(_world: &World<Self>, _id: NodeId, _sender: NodeId) {}

    /// Handles every non-reply message this overlay defines beyond the
    /// common `GET_VALUE`/`SET_VALUE`/`FIND_VALUE`/`STORE_VALUE` quartet
    /// (spec.md §4.4, "Packet dispatch").
    async fn manage_packet(world: Rc<World<Self>>, id: NodeId, packet: Packet);

    /// Locates the `r` nodes (or fewer, near the network edges) responsible
    /// for `key`, returning the hop count the lookup took (spec.md §3,
    /// "Node (DHT)" abstract `find_node`).
    async fn find_node(world: Rc<World<Self>>, id: NodeId, key: Id) -> (Vec<NodeId>, i64);

    /// `FIND_VALUE`: walks the overlay toward `key`'s owner(s), then reads
    /// whichever of them actually holds the value (spec.md §4.4). A
    /// GET_VALUE quorum wait that doesn't complete in time downgrades `hops`
    /// to `-1`, the same signal `find_node`'s own timeout uses (spec.md
    /// line 109: "replies with `hops` (or `-1` on timeout)").
    async fn find_value(world: Rc<World<Self>>, id: NodeId, key: Id) -> (Option<String>, i64) {
        let (holders, hops) = Self::find_node(world.clone(), id, key).await;
        let (value, complete) = read_remote_values(world, id, &holders, key).await;
        (value, if complete { hops } else { -1 })
    }

    /// `STORE_VALUE`: walks the overlay toward `key`'s owner(s), then writes
    /// the value to each of them (spec.md §4.4). A SET_VALUE quorum wait
    /// that doesn't complete in time downgrades `hops` to `-1`, same as
    /// `find_value` above.
    async fn store_value(world: Rc<World<Self>>, id: NodeId, key: Id, value: String) -> i64 {
        let (holders, hops) = Self::find_node(world.clone(), id, key).await;
        let complete = write_remote_values(world, id, &holders, key, value).await;
        if complete {
            hops
        } else {
            -1
        }
    }
}

/// Tries to service `packet` at the "Node (DHT)" common layer
/// (`GET_VALUE`/`SET_VALUE`). Returns `true` if it handled the packet, so
/// the caller's overlay-specific `manage_packet` only needs to fall
/// through to its own message types (spec.md §4.4).
pub async fn handle_common<N: Overlay>(world: Rc<World<N>>, id: NodeId, packet: Packet) -> bool {
    let sender = packet.sender;
    let correlation = match packet.correlation {
        Some(c) => c,
        None => return false,
    };
    match packet.message {
        Message::GetValue { key } => {
            let value = world.arena.get(id).borrow().ht().get(&key).cloned();
            base::send_resp(&world, id, sender, correlation, Message::GetValueReply { value });
            true
        }
        Message::SetValue { key, value } => {
            world.arena.get(id).borrow_mut().ht_mut().insert(key, value);
            base::send_resp(&world, id, sender, correlation, Message::SetValueReply);
            true
        }
        Message::FindValue { key } => {
            let world2 = world.clone();
            world.kernel.spawn(async move {
                let (value, hops) = N::find_value(world2.clone(), id, key).await;
                base::send_resp(&world2, id, sender, correlation, Message::FindValueReply { value, hops });
            });
            true
        }
        Message::StoreValue { key, value } => {
            let world2 = world.clone();
            world.kernel.spawn(async move {
                let hops = N::store_value(world2.clone(), id, key, value).await;
                base::send_resp(&world2, id, sender, correlation, Message::StoreValueReply { hops });
            });
            true
        }
        _other => false,
    }
}

/// Returns the decided value plus whether every GET_VALUE reply arrived
/// before the quorum wait's deadline.
async fn read_remote_values<N: HasBase + 'static>(
    world: Rc<World<N>>,
    id: NodeId,
    holders: &[NodeId],
    key: Id,
) -> (Option<String>, bool) {
    let mut handles = Vec::with_capacity(holders.len());
    for &peer in holders {
        let h = base::send_req(&world, id, peer, Message::GetValue { key });
        handles.push(h);
    }
    let (replies, complete) = base::wait_resps(world, id, handles).await;
    let mut votes: HashMap<Option<String>, usize> = HashMap::new();
    for reply in replies.into_iter().flatten() {
        if let Packet { message: Message::GetValueReply { value }, .. } = reply {
            *votes.entry(value).or_insert(0) += 1;
        }
    }
    // Most common reply wins; a non-null value beats a tied null one
    // (SPEC_FULL.md Open Questions, "most-common-non-null").
    let decided = votes
        .into_iter()
        .max_by_key(|(value, count)| (*count, value.is_some()))
        .and_then(|(value, _)| value);
    (decided, complete)
}

/// Returns whether every SET_VALUE reply arrived before the quorum wait's
/// deadline.
async fn write_remote_values<N: HasBase + 'static>(
    world: Rc<World<N>>,
    id: NodeId,
    holders: &[NodeId],
    key: Id,
    value: String,
) -> bool {
    let mut handles = Vec::with_capacity(holders.len());
    for &peer in holders {
        let h = base::send_req(&world, id, peer, Message::SetValue { key, value: value.clone() });
        handles.push(h);
    }
    let (_replies, complete) = base::wait_resps(world, id, handles).await;
    complete
}

/// Spawns the node's receive loop: pop a packet, pay its service time, then
/// either resolve a correlation handle (replies) or hand the packet to the
/// overlay's `manage_packet` (requests) -- spec.md §4.3/§4.4's "receive,
/// service, dispatch" cycle, running forever until the kernel itself stops
/// (a crashed node just never gets serviced again, per §3's "silently
/// drops... rather than replying").
pub fn spawn_receive_loop<N: Overlay>(world: Rc<World<N>>, id: NodeId) {
    let kernel = world.kernel.clone();
    kernel.spawn(async move {
        loop {
            let packet = base::next_packet(world.clone(), id).await;
            service(world.clone(), id).await;
            if world.arena.get(id).borrow().base().crashed {
                continue;
            }
            N::on_sender_seen(&world, id, packet.sender);
            if packet.message.is_reply() {
                if let Some(correlation) = packet.correlation {
                    base::fire_handle(&world, id, correlation, packet);
                }
                continue;
            }
            if handle_common(world.clone(), id, packet.clone()).await {
                continue;
            }
            N::manage_packet(world.clone(), id, packet).await;
        }
    });
}
