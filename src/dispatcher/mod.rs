//! Task dispatchers
//!
//! A dispatcher takes tasks submitted by the owner thread, ticks them to
//! completion, and hands them back to the owner thread so that their results
//! are finalized and their delegates triggered there. Two scheduling models
//! are proposed:
//!
//! - The threaded dispatcher ticks tasks on a dedicated worker thread. The
//!   owner thread must periodically call game_tick() to process completions,
//!   typically once per application frame.
//! - The cooperative dispatcher does everything from its tick() method, on the
//!   caller's thread. It is meant for embeddings which cannot afford a
//!   separate OS thread.
//!
//! Both models share the same queues and drain algorithms, and therefore
//! provide the same ordering guarantees.

pub mod cooperative;
pub mod threaded;

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;


/// Lifecycle of a dispatcher
///
/// Here are the possible state transitions:
///
/// - Uninitialized -> Running / StopRequested
/// - Running -> StopRequested
/// - StopRequested -> Exited
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    /// The worker has not started processing tasks yet
    Uninitialized = 0,

    /// The worker is processing tasks
    Running = 1,

    /// The worker was asked to stop and will exit after its next wake-up
    StopRequested = 2,

    /// The worker is gone, tasks which were still pending have been dropped
    Exited = 3,
}
//
impl DispatcherState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatcherState::Uninitialized,
            1 => DispatcherState::Running,
            2 => DispatcherState::StopRequested,
            3 => DispatcherState::Exited,
            _ => unreachable!("invalid dispatcher state {}", value),
        }
    }
}


/// Periodic maintenance hook of the surrounding online service layer
///
/// It is invoked once per dispatcher iteration, before any task is ticked,
/// from the context which ticks tasks. It is meant for connection-level
/// housekeeping which is not tied to any particular task.
///
pub trait MaintenanceHook: Send {
    fn online_tick(&mut self);
}
//
impl<F: FnMut() + Send> MaintenanceHook for F {
    fn online_tick(&mut self) {
        self()
    }
}


/// Maintenance hook which does nothing
pub struct NoMaintenance;
//
impl MaintenanceHook for NoMaintenance {
    fn online_tick(&mut self) {}
}


/// Identity of the thread which owns a dispatcher
///
/// Submitting tasks and processing completions from any other thread is a
/// programming error, which is reported by panicking.
///
#[derive(Clone, Copy, Debug)]
pub(crate) struct OwnerThread(ThreadId);
//
impl OwnerThread {
    /// Record the calling thread as the owner
    pub fn current() -> Self {
        OwnerThread(thread::current().id())
    }

    /// Panic if the calling thread is not the owner
    pub fn check(&self, operation: &str) {
        let current = thread::current();
        assert!(current.id() == self.0,
                "{} must be called from the owner thread {:?}, not from {:?} ({:?})",
                operation, self.0, current.id(), current.name());
    }
}


/// Signal used to wake a sleeping worker up
///
/// A wake-up which is signaled while nobody is waiting is not lost: it makes
/// the next wait return immediately.
///
#[derive(Default)]
pub(crate) struct WakeSignal {
    /// Whether a wake-up was signaled since the worker last woke up
    pending: Mutex<bool>,

    /// Condition variable used to wake the worker up
    cv: Condvar,
}
//
impl WakeSignal {
    /// Wake the worker up, or make its next wait return immediately
    pub fn notify(&self) {
        *self.pending.lock() = true;
        self.cv.notify_one();
    }

    /// Wait for a wake-up signal, at most for `timeout`
    pub fn wait_for(&self, timeout: Duration) {
        let mut pending = self.pending.lock();
        if !*pending {
            let _ = self.cv.wait_for(&mut pending, timeout);
        }
        *pending = false;
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    /// Check that the state encoding round-trips
    #[test]
    fn state_encoding() {
        for state in [DispatcherState::Uninitialized,
                      DispatcherState::Running,
                      DispatcherState::StopRequested,
                      DispatcherState::Exited] {
            assert_eq!(DispatcherState::from_u8(state as u8), state);
        }
    }

    /// Check that the owner check passes on the owner thread only
    #[test]
    fn owner_check() {
        let owner = OwnerThread::current();
        owner.check("owner_check");
        let result = thread::spawn(move || owner.check("owner_check")).join();
        assert!(result.is_err());
    }

    /// A wake-up signaled ahead of time is remembered, and consumed once
    #[test]
    fn early_wake() {
        let signal = WakeSignal::default();
        signal.notify();
        let start = std::time::Instant::now();
        signal.wait_for(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(5));

        let start = std::time::Instant::now();
        signal.wait_for(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    /// Closures can be used as maintenance hooks
    #[test]
    fn closure_hook() {
        let mut calls = 0;
        {
            let mut hook = || calls += 1;
            hook.online_tick();
            hook.online_tick();
        }
        assert_eq!(calls, 2);
    }
}
