//! Facilities to represent the status of asynchronous tasks
//!
//! This module provides facilities to represent and reason about the status
//! of asynchronous tasks. The model is the following: a task starts in an
//! "in progress" state, gets ticked by the dispatcher for a while, and finally
//! ends up in either a successful or an unsuccessful final state. Once final,
//! the status never changes again.

use std::time::{Duration, Instant};


/// Representation of an asynchronous task's status
///
/// Here are the possible state transitions:
///
/// - InProgress -> Succeeded / Failed
///
/// Succeeded and Failed are final states.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task still has work to do and expects further ticks
    InProgress,

    /// The task has completed its work successfully
    Succeeded,

    /// The task has completed, but its work did not succeed
    Failed,
}
//
impl TaskStatus {
    /// Check if the status is final (i.e. won't change anymore)
    pub fn is_final(self) -> bool {
        match self {
            TaskStatus::InProgress => false,
            TaskStatus::Succeeded | TaskStatus::Failed => true,
        }
    }

    /// Alias of is_final(), matching the task vocabulary
    pub fn is_done(self) -> bool {
        self.is_final()
    }

    /// Whether the task succeeded. Only meaningful once the task is done.
    pub fn was_successful(self) -> bool {
        self == TaskStatus::Succeeded
    }
}


/// Bookkeeping shared by most task implementations
///
/// Embedding a TaskState in a task provides the creation timestamp, the
/// done/success flags and a tick counter, which is everything the dispatcher
/// and the diagnostics need to know about a task.
///
#[derive(Clone, Debug)]
pub struct TaskState {
    /// When the task was created, used for elapsed time reporting
    created: Instant,

    /// Current status of the task
    status: TaskStatus,

    /// Number of times the task was ticked so far
    ticks: u64,
}
//
impl TaskState {
    /// Create a new in-progress task state, timestamped now
    pub fn new() -> Self {
        TaskState {
            created: Instant::now(),
            status: TaskStatus::InProgress,
            ticks: 0,
        }
    }

    /// Current status of the task
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Move the task to its final status
    pub fn complete(&mut self, success: bool) {
        // A final status is never supposed to change
        debug_assert!(!self.status.is_final(),
                      "task status updated after reaching a final state");
        self.status = if success {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
    }

    /// Record that the task was ticked once more
    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Number of ticks received so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time elapsed since the task was created
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }
}
//
impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    /// Check that the status queries agree with the state machine
    #[test]
    fn status_queries() {
        assert!(!TaskStatus::InProgress.is_final());
        assert!(!TaskStatus::InProgress.was_successful());

        assert!(TaskStatus::Succeeded.is_done());
        assert!(TaskStatus::Succeeded.was_successful());

        assert!(TaskStatus::Failed.is_done());
        assert!(!TaskStatus::Failed.was_successful());
    }

    /// Check the initial task state
    #[test]
    fn initial_state() {
        let state = TaskState::new();
        assert_eq!(state.status(), TaskStatus::InProgress);
        assert_eq!(state.ticks(), 0);
    }

    /// Check that completion and tick recording work
    #[test]
    fn complete() {
        let mut state = TaskState::new();
        state.record_tick();
        state.record_tick();
        state.complete(false);
        assert_eq!(state.ticks(), 2);
        assert_eq!(state.status(), TaskStatus::Failed);
    }

    /// A final status must not be overwritten
    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn complete_twice() {
        let mut state = TaskState::new();
        state.complete(true);
        state.complete(false);
    }
}
