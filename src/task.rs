//! The asynchronous task contract
//!
//! A task is a unit of asynchronous work which follows a tick-until-done
//! contract. The dispatcher ticks it from the worker context until it reports
//! being done, then hands it back to the owner thread, which finalizes it and
//! triggers its completion delegates before destroying it.
//!
//! Tasks are owned by exactly one execution context at a time. They travel
//! between the dispatcher's containers as boxed values, so ownership moves
//! along with them and no task is ever accessed by two threads at once.

use std::fmt;
use std::time::Duration;


/// Owned handle to a task, as stored in the dispatcher's containers
pub type BoxedTask = Box<dyn AsyncTask>;


/// Interface which every asynchronous task must implement
///
/// Display is used as the human-readable task description in logs.
///
pub trait AsyncTask: Send + fmt::Display {
    /// Advance the task's internal state. Called repeatedly from a single
    /// execution context until is_done() returns true, never afterwards.
    /// Should poll rather than block.
    fn tick(&mut self, ctx: &mut TickContext);

    /// Whether the task has finished its work
    fn is_done(&self) -> bool;

    /// Whether the task succeeded, only meaningful once is_done() is true
    fn was_successful(&self) -> bool;

    /// Owner-thread hook used to publish results, called exactly once after
    /// the task has been pulled out of the completion queue
    fn finalize(&mut self) {}

    /// Owner-thread invocation of the completion callbacks, called exactly
    /// once, right after finalize()
    fn trigger_delegates(&mut self) {}

    /// Time elapsed since the task was created
    fn elapsed(&self) -> Duration;
}


/// Per-tick context handed to AsyncTask::tick()
///
/// Besides timing information, it lets a running task spawn follow-up tasks.
/// Those are only inserted into the dispatcher once the current drain step is
/// over, so a parallel task spawned during an iteration will be ticked for the
/// first time on the next iteration.
///
pub struct TickContext {
    /// Time elapsed since the previous dispatcher iteration
    delta: Duration,

    /// Parallel tasks spawned during this tick
    spawned_parallel: Vec<BoxedTask>,

    /// Serial tasks spawned during this tick
    spawned_serial: Vec<BoxedTask>,
}
//
impl TickContext {
    /// Create a tick context for an iteration
    pub(crate) fn new(delta: Duration) -> Self {
        TickContext {
            delta: delta,
            spawned_parallel: Vec::new(),
            spawned_serial: Vec::new(),
        }
    }

    /// Time elapsed since the previous dispatcher iteration
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Queue a follow-up task which will progress independently of others
    pub fn spawn_parallel(&mut self, task: BoxedTask) {
        self.spawned_parallel.push(task);
    }

    /// Queue a follow-up task at the tail of the serial queue
    pub fn spawn_serial(&mut self, task: BoxedTask) {
        self.spawned_serial.push(task);
    }

    /// Extract the tasks spawned so far
    pub(crate) fn take_spawned(&mut self) -> (Vec<BoxedTask>, Vec<BoxedTask>) {
        (std::mem::take(&mut self.spawned_parallel),
         std::mem::take(&mut self.spawned_serial))
    }
}
