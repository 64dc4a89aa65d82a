//! The event kernel (spec.md §4.2): virtual clock, min-heap of timed
//! actions, and a single-threaded cooperative task dispatcher.
//!
//! Tasks are ordinary Rust `async` functions spawned onto a
//! `futures::executor::LocalPool`. There is no OS thread pool and no real
//! passage of time -- the kernel is the only thing that ever decides a task
//! should make progress, by firing a `Waker` registered against a scheduled
//! virtual-time action and then draining the pool until every task is
//! parked again (blocked on its next suspension point). This realizes the
//! "single task step per dispatched moment" contract of spec.md §4.2/§5
//! without hand-rolling an `async`/`await` state machine ourselves --
//! exactly the "re-architect as async/await... driven by the kernel" option
//! spec.md's Design Notes call out.

pub mod event;
pub mod wait;

use std::cell::{Cell, RefCell};
use std::collections::BinaryHeap;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

use event::{Queued, VirtualTime};

pub type KernelHandle = Rc<Kernel>;

/// The event kernel. One instance per simulation run (build phase and run
/// phase each get a fresh `Kernel`, per spec.md §4.8's "two virtual
/// environments in sequence").
///
/// Every field is independently interior-mutable rather than the whole
/// struct living behind one outer `RefCell`: scheduled actions and polled
/// tasks reach back into the kernel (`schedule_after`, `now`, `spawn`) from
/// *inside* `step`'s own call to the action/the pool, so a single outer lock
/// held for the duration of `step`/`run_until_stalled` would make that
/// re-entry panic. Splitting the lock per field means the re-entrant call
/// only ever contends with itself, never with the frame that's already
/// executing.
pub struct Kernel {
    now: Cell<VirtualTime>,
    sequence: Cell<u64>,
    heap: RefCell<BinaryHeap<Queued>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    next_correlation: Cell<u64>,
}

impl Kernel {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Kernel {
            now: Cell::new(0.0),
            sequence: Cell::new(0),
            heap: RefCell::new(BinaryHeap::new()),
            pool: RefCell::new(pool),
            spawner,
            next_correlation: Cell::new(0),
        }
    }

    /// The current virtual clock reading.
    pub fn now(&self) -> VirtualTime {
        self.now.get()
    }

    /// Allocates a fresh, never-reused correlation handle.
    pub fn next_correlation_id(&self) -> wait::CorrelationId {
        let id = self.next_correlation.get();
        self.next_correlation.set(id + 1);
        wait::CorrelationId(id)
    }

    /// Schedules `action` to run once, at `now + delay`. `delay` must be
    /// non-negative; ties at the same virtual time are broken by strict
    /// insertion order (spec.md §3 Event, §4.2).
    pub fn schedule_after(&self, delay: VirtualTime, action: impl FnOnce(&Kernel) + 'static) {
        debug_assert!(delay >= 0.0, "scheduled delay must be non-negative");
        let time = self.now.get() + delay.max(0.0);
        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);
        self.heap.borrow_mut().push(Queued {
            time,
            sequence,
            action: Box::new(action),
        });
    }

    /// Spawns a cooperative task onto the local pool. The task runs until
    /// its first suspension point the next time the pool is drained.
    pub fn spawn(&self, fut: impl std::future::Future<Output = ()> + 'static) {
        self.spawner
            .spawn_local(fut)
            .expect("local pool accepts spawn before it is dropped");
    }

    /// Pops and runs every action scheduled for the single earliest
    /// `(time, sequence)` in the heap, advancing the clock to that instant,
    /// then drains the task pool until every task is parked again. Returns
    /// `false` once the heap is empty and nothing further can happen.
    fn step(&self) -> bool {
        let next = match self.heap.borrow_mut().pop() {
            Some(q) => q,
            None => return false,
        };
        self.now.set(next.time);
        (next.action)(self);
        self.pool.borrow_mut().run_until_stalled();
        true
    }

    /// Runs the kernel to quiescence: no more scheduled actions and no task
    /// makes further progress.
    pub fn run(&self) {
        self.pool.borrow_mut().run_until_stalled();
        while self.step() {}
    }

    /// Runs the kernel while `should_continue` holds, stopping early at
    /// quiescence. Used to drive a single bounded task (e.g. the build
    /// phase's sequential joins) to completion without waiting for every
    /// other spawned background task's infinite loop to also go quiet.
    pub fn run_while(&self, mut should_continue: impl FnMut() -> bool) {
        self.pool.borrow_mut().run_until_stalled();
        while should_continue() && self.step() {}
    }

    /// Runs the kernel until the virtual clock would advance past `until`,
    /// or quiescence, whichever comes first. Actions scheduled exactly at
    /// `until` still run.
    pub fn run_until(&self, until: VirtualTime) {
        self.pool.borrow_mut().run_until_stalled();
        loop {
            let peek_time = match self.heap.borrow().peek() {
                Some(q) => q.time,
                None => break,
            };
            if peek_time > until {
                break;
            }
            if !self.step() {
                break;
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn schedule_after_runs_in_time_order() {
        let k = Kernel::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = order.clone();
        k.schedule_after(5.0, move |_| o1.borrow_mut().push("late"));
        let o2 = order.clone();
        k.schedule_after(1.0, move |_| o2.borrow_mut().push("early"));
        k.run();
        assert_eq!(*order.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let k = Kernel::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let o = order.clone();
            k.schedule_after(3.0, move |_| o.borrow_mut().push(i));
        }
        k.run();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn run_until_stops_at_boundary() {
        let k = Kernel::new();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        k.schedule_after(10.0, move |_| h.set(true));
        k.run_until(5.0);
        assert!(!hit.get());
        assert!((k.now() - 0.0).abs() < 1e-9);
        k.run_until(10.0);
        assert!(hit.get());
    }

    #[test]
    fn sleep_resumes_task_at_the_right_time() {
        let kernel = Rc::new(Kernel::new());
        let woke_at = Rc::new(RefCell::new(None));
        let woke_at_task = woke_at.clone();
        let k2 = kernel.clone();
        kernel.spawn(async move {
            wait::sleep(k2.clone(), 2.5).await;
            *woke_at_task.borrow_mut() = Some(k2.now());
        });
        kernel.run();
        assert_eq!(*woke_at.borrow(), Some(2.5));
    }
}
