//! Per-thread settlement queue.
//!
//! Settling a node settles its children, which settle theirs, and so on down
//! the chain. Work is queued on the settling thread and drained by the
//! outermost call, so a chain settles (and is torn down) one level at a time
//! instead of one stack frame per level.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Run `job` on this thread after the work already queued ahead of it.
///
/// Returns once the queue is empty, unless a drain further up the stack owns
/// it, in which case the job is left for that drain.
pub(crate) fn schedule(job: impl FnOnce() + 'static) {
    let mut pending: Option<Job> = Some(Box::new(job));
    let _ = QUEUE.try_with(|queue| {
        if let Some(job) = pending.take() {
            queue.borrow_mut().push_back(job);
        }
    });
    if let Some(job) = pending {
        // thread-locals already torn down
        job();
        return;
    }

    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    let _drain = Drain;
    while let Some(job) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        job();
    }
}

struct Drain;

impl Drop for Drain {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // a reaction unwound; whatever it left queued is abandoned
            loop {
                let abandoned = QUEUE.with(|queue| mem::take(&mut *queue.borrow_mut()));
                if abandoned.is_empty() {
                    break;
                }
                drop(abandoned);
            }
        }
        DRAINING.with(|draining| draining.set(false));
    }
}
