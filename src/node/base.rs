//! Node (base) runtime: receive queue discipline, request/reply
//! correlation, and the composable suspension helpers built on top of the
//! event kernel (spec.md §4.3).

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::task::{Poll, Waker};

use futures::future;

use crate::error::{SimError, SimResult};
use crate::kernel::wait::{any_of, sleep, CorrelationId, Race};
use crate::location::{Coord, LocationService};
use crate::packet::{Message, NodeId, Packet};

use super::{HasBase, World};

/// What a node remembers about one outstanding correlation handle.
enum HandleSlot {
    /// A task is parked waiting for this handle; wake it once the reply
    /// arrives.
    Waiting(Waker),
    /// The reply arrived before anyone asked for it (a benign race between
    /// `send_req` returning and the first poll of `wait_resp`).
    Delivered(Packet),
}

/// Fields common to every overlay node (spec.md §3, "Node (base)").
pub struct NodeBase<N> {
    pub id: NodeId,
    pub name: String,
    pub location: Coord,
    pub queue_capacity: usize,
    pub mean_service_time: f64,
    pub max_timeout: f64,
    pub crashed: bool,
    pub recv_queue: VecDeque<Packet>,
    recv_waker: Option<Waker>,
    handles: HashMap<CorrelationId, HandleSlot>,
    pub world: Rc<World<N>>,
}

impl<N> NodeBase<N> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: Rc<World<N>>,
        id: NodeId,
        name: String,
        location: Coord,
        queue_capacity: usize,
        mean_service_time: f64,
        max_timeout: f64,
    ) -> Self {
        NodeBase {
            id,
            name,
            location,
            queue_capacity,
            mean_service_time,
            max_timeout,
            crashed: false,
            recv_queue: VecDeque::new(),
            recv_waker: None,
            handles: HashMap::new(),
            world,
        }
    }
}

/// Delivers `packet` to `dest`'s receive queue, applying the drop-on-full
/// discipline and recording the resulting queue length (spec.md §4.3,
/// "Receive discipline").
pub fn enqueue<N: HasBase>(world: &World<N>, dest: NodeId, packet: Packet) {
    let node_rc = world.arena.get(dest);
    let (name, qlen, waker, accepted) = {
        let mut node = node_rc.borrow_mut();
        let base = node.base_mut();
        if base.recv_queue.len() >= base.queue_capacity {
            (base.name.clone(), base.recv_queue.len(), None, false)
        } else {
            base.recv_queue.push_back(packet);
            let waker = base.recv_waker.take();
            (base.name.clone(), base.recv_queue.len(), waker, true)
        }
    };
    if !accepted {
        tracing::warn!(node = %name, "receive queue full, dropping packet");
        return;
    }
    let now = world.kernel.now();
    world.collector.borrow_mut().record_queue_load(&name, now, qlen);
    if let Some(w) = waker {
        w.wake();
    }
}

/// Pops the next packet off `id`'s receive queue, suspending the caller
/// until one is available.
pub fn next_packet<N: HasBase + 'static>(world: Rc<World<N>>, id: NodeId) -> impl std::future::Future<Output = Packet> {
    future::poll_fn(move |cx| {
        let node_rc = world.arena.get(id);
        let mut node = node_rc.borrow_mut();
        let base = node.base_mut();
        match base.recv_queue.pop_front() {
            Some(pkt) => Poll::Ready(pkt),
            None => {
                base.recv_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    })
}

/// Resolves the transmission delay between two nodes via the location
/// service (spec.md §4.3: `haversine_km / 100`).
pub fn transmit_delay<N: HasBase>(world: &World<N>, a: NodeId, b: NodeId) -> f64 {
    let loc_a = world.arena.get(a).borrow().base().location;
    let loc_b = world.arena.get(b).borrow().base().location;
    LocationService::transmission_delay(loc_a, loc_b)
}

/// Sends a request, allocating a fresh correlation handle the caller uses to
/// later `wait_resp` on the reply. The handle is embedded in the packet so
/// the receiver can echo it back in its own reply (spec.md §4.3).
pub fn send_req<N: HasBase + 'static>(
    world: &Rc<World<N>>,
    from: NodeId,
    to: NodeId,
    message: Message,
) -> CorrelationId {
    let handle = world.kernel.next_correlation_id();
    let delay = transmit_delay(world, from, to);
    let world_for_delivery = world.clone();
    world.kernel.schedule_after(delay, move |_k| {
        enqueue(
            &world_for_delivery,
            to,
            Packet {
                sender: from,
                message,
                correlation: Some(handle),
            },
        );
    });
    handle
}

/// Sends a reply, reusing the correlation handle carried by the original
/// request rather than allocating a new one (spec.md §4.3).
pub fn send_resp<N: HasBase + 'static>(
    world: &Rc<World<N>>,
    from: NodeId,
    to: NodeId,
    correlation: CorrelationId,
    message: Message,
) {
    let delay = transmit_delay(world, from, to);
    let world_for_delivery = world.clone();
    world.kernel.schedule_after(delay, move |_k| {
        enqueue(
            &world_for_delivery,
            to,
            Packet {
                sender: from,
                message,
                correlation: Some(correlation),
            },
        );
    });
}

/// Fires `handle` with `packet` if (and only if) some task is currently
/// parked waiting for it. A reply arriving for a handle nobody is waiting on
/// anymore (the waiter already timed out) is dropped on the floor -- "late
/// events never retroactively modify state" (spec.md §5).
pub fn fire_handle<N: HasBase>(world: &World<N>, id: NodeId, handle: CorrelationId, packet: Packet) {
    let node_rc = world.arena.get(id);
    let mut node = node_rc.borrow_mut();
    let base = node.base_mut();
    if let Some(HandleSlot::Waiting(waker)) = base.handles.remove(&handle) {
        waker.wake();
        base.handles.insert(handle, HandleSlot::Delivered(packet));
    }
}

fn wait_for_handle<N: HasBase + 'static>(
    world: Rc<World<N>>,
    id: NodeId,
    handle: CorrelationId,
) -> impl std::future::Future<Output = Packet> {
    future::poll_fn(move |cx| {
        let node_rc = world.arena.get(id);
        let mut node = node_rc.borrow_mut();
        let base = node.base_mut();
        match base.handles.remove(&handle) {
            Some(HandleSlot::Delivered(pkt)) => Poll::Ready(pkt),
            Some(HandleSlot::Waiting(_)) | None => {
                base.handles.insert(handle, HandleSlot::Waiting(cx.waker().clone()));
                Poll::Pending
            }
        }
    })
}

/// Waits for the single reply matching `handle`, racing it against `id`'s
/// `max_timeout` (spec.md §4.3, `wait_resp`).
pub async fn wait_resp<N: HasBase + 'static>(
    world: Rc<World<N>>,
    id: NodeId,
    handle: CorrelationId,
) -> SimResult<Packet> {
    let max_timeout = world.arena.get(id).borrow().base().max_timeout;
    let reply = wait_for_handle(world.clone(), id, handle);
    let timeout = sleep(world.kernel.clone(), max_timeout);
    match any_of(reply, timeout).await {
        Race::Left(pkt) => Ok(pkt),
        Race::Right(()) => {
            world.arena.get(id).borrow_mut().base_mut().drop_handle(&handle);
            Err(SimError::PeerTimeout)
        }
    }
}

/// Waits for every handle in `handles`, racing the whole batch against `id`'s
/// `max_timeout`. Returns one slot per input handle (`None` where no reply
/// arrived in time) plus whether every handle resolved (spec.md §4.3,
/// `wait_resps`).
pub fn wait_resps<N: HasBase + 'static>(
    world: Rc<World<N>>,
    id: NodeId,
    handles: Vec<CorrelationId>,
) -> impl std::future::Future<Output = (Vec<Option<Packet>>, bool)> {
    let max_timeout = world.arena.get(id).borrow().base().max_timeout;
    let mut results: Vec<Option<Packet>> = vec![None; handles.len()];
    let deadline_scheduled = Rc::new(Cell::new(false));
    let deadline_fired = Rc::new(Cell::new(false));

    future::poll_fn(move |cx| {
        if !deadline_scheduled.get() {
            deadline_scheduled.set(true);
            let fired = deadline_fired.clone();
            let waker = cx.waker().clone();
            world.kernel.schedule_after(max_timeout, move |_k| {
                fired.set(true);
                waker.wake();
            });
        }

        let node_rc = world.arena.get(id);
        for (slot, handle) in results.iter_mut().zip(handles.iter()) {
            if slot.is_some() {
                continue;
            }
            let mut node = node_rc.borrow_mut();
            let base = node.base_mut();
            match base.handles.remove(handle) {
                Some(HandleSlot::Delivered(pkt)) => *slot = Some(pkt),
                Some(HandleSlot::Waiting(_)) | None => {
                    base.handles.insert(*handle, HandleSlot::Waiting(cx.waker().clone()));
                }
            }
        }

        if results.iter().all(Option::is_some) {
            return Poll::Ready((std::mem::take(&mut results), true));
        }
        if deadline_fired.get() {
            let mut node = node_rc.borrow_mut();
            for (slot, handle) in results.iter().zip(handles.iter()) {
                if slot.is_none() {
                    node.base_mut().drop_handle(handle);
                }
            }
            return Poll::Ready((std::mem::take(&mut results), false));
        }
        Poll::Pending
    })
}

/// Suspends the caller for `mean_service_time ~ Exponential(..)` (spec.md
/// §4.3, "the node waits `service_time ~ Exponential(mean_service_time)`").
/// This is the explicit stand-in for the Python source's `packet_service`
/// decorator (spec.md Design Notes §9).
pub async fn service<N: HasBase + 'static>(world: Rc<World<N>>, id: NodeId) {
    let mean = world.arena.get(id).borrow().base().mean_service_time;
    let svc = world.rng.borrow_mut().exponential(mean);
    sleep(world.kernel.clone(), svc).await;
}

impl<N> NodeBase<N> {
    /// Removes a handle registration without delivering anything -- used to
    /// purge an orphaned wait after its timeout wins the race.
    fn drop_handle(&mut self, handle: &CorrelationId) {
        self.handles.remove(handle);
    }
}
