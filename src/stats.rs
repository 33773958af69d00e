//! Polling-based dispatcher monitoring
//!
//! The worker thread publishes a snapshot of its activity after every
//! iteration. The owner thread only needs to glance at it from time to time,
//! for instance to display a diagnostics overlay, and should never contend
//! with the worker for the task containers' locks to do so. A triple buffer
//! gives it lock-free access to the latest snapshot.

use triple_buffer::{Input, Output, TripleBuffer};

use crate::dispatcher::DispatcherState;


/// Snapshot of a dispatcher's activity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Lifecycle state of the dispatcher
    pub state: DispatcherState,

    /// Number of iterations performed so far
    pub iterations: u64,

    /// Tasks waiting in the serial queue at the end of the last iteration
    pub serial_pending: usize,

    /// Tasks in the parallel set at the end of the last iteration
    pub parallel_pending: usize,

    /// Tasks which were ticked to completion so far
    pub completed: u64,

    /// Inbound messages which were processed so far
    pub messages: u64,
}
//
impl Default for DispatcherStats {
    fn default() -> Self {
        DispatcherStats {
            state: DispatcherState::Uninitialized,
            iterations: 0,
            serial_pending: 0,
            parallel_pending: 0,
            completed: 0,
            messages: 0,
        }
    }
}


/// Set up a stats channel, split into a worker side and an owner side
pub(crate) fn channel(initial: &DispatcherStats) -> (StatsPublisher, StatsMonitor) {
    let (buf_input, buf_output) = TripleBuffer::new(initial).split();
    (StatsPublisher { buf_input: buf_input },
     StatsMonitor { buf_output: buf_output })
}


/// Worker side of the stats channel
pub(crate) struct StatsPublisher {
    /// New snapshots will be sent through this triple buffer
    buf_input: Input<DispatcherStats>,
}
//
impl StatsPublisher {
    /// Make a new snapshot visible to the owner thread
    pub fn publish(&mut self, stats: DispatcherStats) {
        self.buf_input.write(stats);
    }
}


/// Owner side of the stats channel
pub(crate) struct StatsMonitor {
    /// Latest snapshot will be read through this triple buffer
    buf_output: Output<DispatcherStats>,
}
//
impl StatsMonitor {
    /// Access the latest published snapshot
    pub fn read(&mut self) -> &DispatcherStats {
        self.buf_output.read()
    }
}
