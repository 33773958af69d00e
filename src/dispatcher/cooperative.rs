//! Cooperative task dispatcher, for embeddings without a spare thread
//!
//! This dispatcher follows the same scheduling rules as the threaded one, but
//! does all of its work inline, from the tick() method, on the owner thread:
//! maintenance hook, inbound messages, parallel set, serial queue, then
//! completion processing.
//! Since only one thread ever touches the containers, none of them is locked.

use log::{info, trace, warn};
use std::time::{Duration, Instant};

use crate::dispatcher::{DispatcherState, MaintenanceHook, OwnerThread};
use crate::inbox::{MessageInbox, MessageSender};
use crate::port::CompletionPort;
use crate::queues::{self, LocalQueues, TaskQueues};
use crate::stats::DispatcherStats;
use crate::task::BoxedTask;


/// Task dispatcher which runs everything on the caller's thread
pub struct CooperativeDispatcher {
    /// Task containers, accessed from the owner thread only
    queues: LocalQueues,

    /// Thread which created the dispatcher
    owner: OwnerThread,

    /// Periodic maintenance hook, called at the start of each tick
    hook: Box<dyn MaintenanceHook>,

    /// Items handed over through completion ports
    port: CompletionPort,

    /// Messages to be processed at the start of each tick
    inbox: MessageInbox,

    /// When the previous tick happened
    last_tick: Option<Instant>,

    /// Activity counters
    stats: DispatcherStats,
}
//
impl CooperativeDispatcher {
    /// Create a dispatcher owned by the calling thread
    pub fn new<H: MaintenanceHook + 'static>(hook: H) -> Self {
        info!("Created cooperative task dispatcher");
        CooperativeDispatcher {
            queues: LocalQueues::default(),
            owner: OwnerThread::current(),
            hook: Box::new(hook),
            port: CompletionPort::new(),
            inbox: MessageInbox::new(),
            last_tick: None,
            stats: DispatcherStats {
                state: DispatcherState::Running,
                ..DispatcherStats::default()
            },
        }
    }

    /// Queue a task which must only start once every serial task submitted
    /// before it has completed
    pub fn submit_serial(&mut self, task: BoxedTask) {
        self.owner.check("CooperativeDispatcher::submit_serial");
        trace!("Submitting serial task {}", task);
        self.queues.push_serial(task);
        self.stats.serial_pending = self.queues.serial_len();
    }

    /// Queue a task which progresses independently of all other tasks
    pub fn submit_parallel(&mut self, task: BoxedTask) {
        self.owner.check("CooperativeDispatcher::submit_parallel");
        trace!("Submitting parallel task {}", task);
        self.queues.push_parallel(task);
        self.stats.parallel_pending = self.queues.parallel_len();
    }

    /// Run one dispatcher iteration, then finalize every completed task and
    /// trigger its delegates. Returns the number of tasks which were
    /// processed.
    pub fn tick(&mut self) -> usize {
        self.owner.check("CooperativeDispatcher::tick");

        self.hook.online_tick();
        let messages = self.inbox.process_all();
        self.port.forward(&mut self.queues);

        let now = Instant::now();
        let delta = self.last_tick.map_or(Duration::ZERO, |last| now - last);
        self.last_tick = Some(now);
        let completed = queues::drain_iteration(&mut self.queues, delta);

        self.stats.iterations += 1;
        self.stats.completed += completed as u64;
        self.stats.messages += messages as u64;
        self.stats.serial_pending = self.queues.serial_len();
        self.stats.parallel_pending = self.queues.parallel_len();

        queues::drain_completed(&mut self.queues)
    }

    /// Handle which can be used to push already-completed tasks
    pub fn completion_port(&self) -> CompletionPort {
        self.port.clone()
    }

    /// Handle which can be used to send messages to be processed by tick()
    pub fn message_sender(&self) -> MessageSender {
        self.inbox.sender()
    }

    /// Activity counters
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Number of tasks waiting in the serial queue
    pub fn serial_len(&self) -> usize {
        self.queues.serial_len()
    }

    /// Number of tasks in the parallel set
    pub fn parallel_len(&self) -> usize {
        self.queues.parallel_len()
    }
}
//
impl Drop for CooperativeDispatcher {
    fn drop(&mut self) {
        let pending = self.queues.serial_len() + self.queues.parallel_len()
                      + self.port.len();
        if pending > 0 {
            warn!("Dropping cooperative task dispatcher with {} pending task(s)",
                  pending);
        }
        let messages = self.inbox.close();
        if messages > 0 {
            warn!("Dropping cooperative task dispatcher with {} unprocessed \
                   message(s)", messages);
        }
    }
}
