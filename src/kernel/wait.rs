//! Composable suspension primitives (spec.md §4.2, §5).
//!
//! `sleep` is the kernel's one bespoke `Future`; `any_of`/`all_of` are thin,
//! purpose-named wrappers over `futures::future::select`/`join_all` -- the
//! `futures` crate already expresses exactly the rendezvous semantics the
//! spec asks for, so there is no reason to hand-roll a combinator.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::task::Poll;

use futures::future::{self, Either};

use super::Kernel;

/// Opaque token identifying one outstanding request/reply pair. The kernel
/// never reuses a value, so "fires at most once" (spec.md §8) holds for
/// free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u64);

/// Suspends the calling task until `delay` virtual-time units have elapsed.
pub fn sleep(kernel: Rc<Kernel>, delay: super::event::VirtualTime) -> impl Future<Output = ()> {
    let fired = Rc::new(Cell::new(false));
    let scheduled = Rc::new(Cell::new(false));
    future::poll_fn(move |cx| {
        if fired.get() {
            return Poll::Ready(());
        }
        if !scheduled.get() {
            scheduled.set(true);
            let fired_for_closure = fired.clone();
            let waker = cx.waker().clone();
            kernel.schedule_after(delay, move |_k| {
                fired_for_closure.set(true);
                waker.wake();
            });
        }
        Poll::Pending
    })
}

/// Result of a race between two futures: which one (or both, if they
/// complete at the exact same poll) finished.
pub enum Race<A, B> {
    Left(A),
    Right(B),
}

/// Waits for whichever of `a`/`b` completes first; the loser is dropped
/// (spec.md §5 "Cancellation": suspended tasks are cancelled only
/// implicitly, by their sibling in the race completing first).
pub async fn any_of<A, B>(a: A, b: B) -> Race<A::Output, B::Output>
where
    A: Future + Unpin,
    B: Future + Unpin,
{
    match future::select(a, b).await {
        Either::Left((v, _)) => Race::Left(v),
        Either::Right((v, _)) => Race::Right(v),
    }
}

/// Waits for every future in `items` to complete, preserving order.
pub async fn all_of<F: Future>(items: Vec<F>) -> Vec<F::Output> {
    future::join_all(items).await
}
