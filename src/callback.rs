//! Closure-based tasks with completion delegates
//!
//! Most service calls do not need a dedicated task type: they poll some
//! backend until a result is available, optionally copy that result somewhere
//! the owner thread can see it, and notify whoever asked for it. FnTask covers
//! this common case by assembling a task out of closures.
//!
//! Delegates are stored on the task itself and run on the owner thread, from
//! trigger_delegates(), in registration order. Since the task travels through
//! the worker thread before that, the closures need to be Send.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::status::TaskState;
use crate::task::{AsyncTask, TickContext};


/// Reason why a task did not succeed
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskFailure(pub String);
//
impl TaskFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        TaskFailure(reason.into())
    }
}


/// Outcome of a closure-based task
pub type TaskResult<T> = Result<T, TaskFailure>;

/// Poll closure: returns None while the work is still in progress
type PollFn<T> = Box<dyn FnMut(&mut TickContext) -> Option<TaskResult<T>> + Send>;

/// Owner-thread finalization closure
type FinalizeFn<T> = Box<dyn FnOnce(&mut TaskResult<T>) + Send>;

/// Completion callback
type Delegate<T> = Box<dyn FnOnce(&TaskResult<T>) + Send>;


/// AsyncTask implementation assembled from closures
pub struct FnTask<T: Send + 'static> {
    /// Human-readable description
    description: String,

    /// Timing and completion bookkeeping
    state: TaskState,

    /// Drives the operation forward
    poll: PollFn<T>,

    /// Result, available once the task is done
    result: Option<TaskResult<T>>,

    /// Optional owner-thread result marshalling
    finalizer: Option<FinalizeFn<T>>,

    /// Completion callbacks, in registration order
    delegates: Vec<Delegate<T>>,
}
//
impl<T: Send + 'static> FnTask<T> {
    /// Create a task which calls `poll` on every tick until it yields a result
    pub fn new<F>(description: impl Into<String>, poll: F) -> Self
        where F: FnMut(&mut TickContext) -> Option<TaskResult<T>> + Send + 'static
    {
        FnTask {
            description: description.into(),
            state: TaskState::new(),
            poll: Box::new(poll),
            result: None,
            finalizer: None,
            delegates: Vec::new(),
        }
    }

    /// Set the closure which runs on the owner thread before the delegates
    pub fn on_finalize<F>(mut self, finalizer: F) -> Self
        where F: FnOnce(&mut TaskResult<T>) + Send + 'static
    {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Register a completion delegate
    pub fn on_complete<F>(mut self, delegate: F) -> Self
        where F: FnOnce(&TaskResult<T>) + Send + 'static
    {
        self.delegates.push(Box::new(delegate));
        self
    }

    /// Result of the task, if it is done
    pub fn result(&self) -> Option<&TaskResult<T>> {
        self.result.as_ref()
    }

    /// Number of ticks received so far
    pub fn ticks(&self) -> u64 {
        self.state.ticks()
    }
}
//
impl<T: Send + 'static> AsyncTask for FnTask<T> {
    fn tick(&mut self, ctx: &mut TickContext) {
        debug_assert!(!self.is_done(), "ticked a completed task: {}", self);
        self.state.record_tick();
        if let Some(result) = (self.poll)(ctx) {
            self.state.complete(result.is_ok());
            self.result = Some(result);
        }
    }

    fn is_done(&self) -> bool {
        self.state.status().is_done()
    }

    fn was_successful(&self) -> bool {
        self.state.status().was_successful()
    }

    fn finalize(&mut self) {
        if let (Some(finalizer), Some(result)) = (self.finalizer.take(),
                                                  self.result.as_mut()) {
            finalizer(result);
        }
    }

    fn trigger_delegates(&mut self) {
        let result = match self.result {
            Some(ref result) => result,
            None => return,
        };
        for delegate in self.delegates.drain(..) {
            delegate(result);
        }
    }

    fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }
}
//
impl<T: Send + 'static> fmt::Display for FnTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}
