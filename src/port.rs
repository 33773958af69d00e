//! Direct access to the completion queue
//!
//! Some items never need ticking: a notification caught by the periodic
//! maintenance hook, for instance, is complete the moment it is received, but
//! still has to be delivered on the owner thread like any task result. A
//! CompletionPort lets such items skip the serial queue and the parallel set.
//!
//! Items pushed into the port are moved into the completion queue by the
//! dispatcher right after the maintenance hook has run, in push order, ahead
//! of the tasks completed during that same iteration. Pushing an item wakes
//! a sleeping worker up, like submitting a task does.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::dispatcher::WakeSignal;
use crate::queues::TaskQueues;
use crate::task::BoxedTask;


/// Cloneable handle used to hand already-completed tasks to a dispatcher
#[derive(Clone, Default)]
pub struct CompletionPort {
    /// Items waiting to be moved into the completion queue
    inbox: Arc<Mutex<VecDeque<BoxedTask>>>,

    /// Wake-up signal of the worker thread, if there is one
    signal: Option<Arc<WakeSignal>>,
}
//
impl CompletionPort {
    /// Port of a dispatcher which has no worker to wake up
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Port which wakes a worker thread up on every push
    pub(crate) fn with_signal(signal: Arc<WakeSignal>) -> Self {
        CompletionPort {
            inbox: Arc::default(),
            signal: Some(signal),
        }
    }

    /// Hand over a task which is already done. Can be called from any thread.
    ///
    /// # Panics
    ///
    /// If the task is not done yet, since finalizing it would break the task
    /// contract.
    ///
    pub fn push(&self, task: BoxedTask) {
        assert!(task.is_done(),
                "task {} was pushed to a completion port before being done",
                task);
        self.inbox.lock().push_back(task);
        if let Some(ref signal) = self.signal {
            signal.notify();
        }
    }

    /// Number of items not yet moved to the completion queue
    pub fn len(&self) -> usize {
        self.inbox.lock().len()
    }

    /// Whether every pushed item was moved to the completion queue
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every pending item into the completion queue
    pub(crate) fn forward<Q: TaskQueues>(&self, queues: &mut Q) -> usize {
        let items = std::mem::take(&mut *self.inbox.lock());
        let count = items.len();
        for item in items {
            queues.push_completed(item);
        }
        count
    }
}
