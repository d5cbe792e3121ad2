//! Priority admission queue.
//!
//! Waiters are ordered by [`TaskPriority`] (higher priority first); ties
//! within the same priority class are broken FIFO by enqueue sequence
//! number, matching the ordering guarantees in spec §5(a)-(b).

use futures::future::BoxFuture;
use resilience_core::context::TaskPriority;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// A queued unit of work: a boxed, type-erased closure that runs the
/// operation and delivers its result through its own internal channel.
pub(crate) struct QueuedTask {
    pub(crate) priority: TaskPriority,
    seq: u64,
    pub(crate) run: BoxFuture<'static, ()>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority must compare greater so
        // it's popped first. Within equal priority, the lower sequence
        // number (enqueued earlier) must compare greater so FIFO holds.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

/// Bounded, priority-ordered admission queue shared by every caller of
/// [`crate::TaskManager::schedule_task_with_priority`] and drained by the
/// manager's dispatcher loop.
pub(crate) struct AdmissionQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    max_queue_size: usize,
}

impl AdmissionQueue {
    pub(crate) fn new(max_queue_size: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Notify::new(),
            max_queue_size,
        }
    }

    /// Attempts to enqueue `run` at `priority`. Returns `Err(())` if the
    /// queue is already at `max_queue_size`.
    pub(crate) fn try_enqueue(
        &self,
        priority: TaskPriority,
        run: BoxFuture<'static, ()>,
    ) -> Result<usize, ()> {
        let mut state = self.state.lock().expect("admission queue mutex poisoned");
        if state.heap.len() >= self.max_queue_size {
            return Err(());
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedTask { priority, seq, run });
        let depth = state.heap.len();
        drop(state);
        self.notify.notify_one();
        Ok(depth)
    }

    fn try_pop(&self) -> Option<QueuedTask> {
        self.state
            .lock()
            .expect("admission queue mutex poisoned")
            .heap
            .pop()
    }

    pub(crate) fn depth(&self) -> usize {
        self.state.lock().expect("admission queue mutex poisoned").heap.len()
    }

    /// Wakes any dispatcher blocked in [`Self::wait_for_next`] so it can
    /// re-check the draining flag even if nothing new was enqueued.
    pub(crate) fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Waits for the next highest-priority task. Returns `None` once
    /// `draining` is set and the queue has been fully drained.
    pub(crate) async fn wait_for_next(&self, draining: &AtomicBool) -> Option<QueuedTask> {
        loop {
            if let Some(task) = self.try_pop() {
                return Some(task);
            }
            if draining.load(AtomicOrdering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}
