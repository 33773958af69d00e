//! Threaded task dispatcher
//!
//! Tasks are ticked on a dedicated worker thread, which sleeps on a wake
//! signal between iterations. Submitting a task wakes the worker up, and so
//! does a stop request. Absent any of those, the worker still wakes up once
//! per polling interval so that the periodic maintenance hook keeps running.
//!
//! Completed tasks are handed back to the owner thread through the completion
//! queue, which the owner must drain by calling game_tick() regularly.
//!
//! When the dispatcher is stopped, tasks which were still waiting in the
//! serial queue or in the parallel set are dropped without being finalized,
//! and their delegates are never triggered. Tasks which had already reached
//! the completion queue are unaffected and can still be processed by
//! game_tick() once the worker has exited, and so are items pushed through a
//! completion port. Tasks submitted once a stop was requested are dropped
//! right away, with a warning.

use log::{error, info, trace, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::config::DispatcherConfig;
use crate::dispatcher::{DispatcherState, MaintenanceHook, OwnerThread, WakeSignal};
use crate::error::DispatcherError;
use crate::inbox::{MessageInbox, MessageSender};
use crate::port::CompletionPort;
use crate::queues::{self, SharedQueues, TaskQueues};
use crate::stats::{self, DispatcherStats, StatsMonitor, StatsPublisher};
use crate::task::BoxedTask;


/// State shared between the owner and the worker thread
struct SharedState {
    /// Task containers, each with its own lock
    queues: SharedQueues,

    /// Items handed over through completion ports
    port: CompletionPort,

    /// Messages to be processed by the worker
    inbox: MessageInbox,

    /// Current DispatcherState, stored as its u8 representation
    state: AtomicU8,

    /// Used to wake the worker up
    signal: Arc<WakeSignal>,

    /// Upper bound on the worker's sleep
    polling_interval: Duration,

    /// Identity of the worker thread, recorded when it starts running
    worker_thread: OnceLock<ThreadId>,
}
//
impl SharedState {
    fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Wake the worker up, or make its next wait return immediately
    fn wake(&self) {
        self.signal.notify();
    }

    /// Wait for a wake-up signal, at most for one polling interval
    fn wait(&self) {
        self.signal.wait_for(self.polling_interval);
    }

    /// Ask the worker to stop, unless it is already gone
    fn request_stop(&self) {
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            match DispatcherState::from_u8(s) {
                DispatcherState::Exited | DispatcherState::StopRequested => None,
                _ => Some(DispatcherState::StopRequested as u8),
            }
        });
        self.wake();
    }

    /// Snapshot of the dispatcher's activity
    fn snapshot(&self, iterations: u64, completed: u64, messages: u64) -> DispatcherStats {
        DispatcherStats {
            state: self.state(),
            iterations: iterations,
            serial_pending: self.queues.serial_len(),
            parallel_pending: self.queues.parallel_len(),
            completed: completed,
            messages: messages,
        }
    }
}


/// Task dispatcher running tasks on a worker thread
pub struct Dispatcher {
    /// State shared with the worker thread
    shared: Arc<SharedState>,

    /// Thread which created the dispatcher
    owner: OwnerThread,

    /// Worker thread, until it has been joined
    worker: Option<JoinHandle<()>>,

    /// Latest activity snapshot published by the worker
    stats: StatsMonitor,
}
//
impl Dispatcher {
    /// Create a dispatcher owned by the calling thread, and start its worker
    ///
    /// The maintenance hook is moved to the worker thread and called there
    /// once per iteration.
    ///
    pub fn start<H>(config: &DispatcherConfig, hook: H) -> Result<Self, DispatcherError>
        where H: MaintenanceHook + 'static
    {
        config.validate()?;

        // Start by building the shared state...
        let signal = Arc::new(WakeSignal::default());
        let shared = Arc::new(
            SharedState {
                queues: SharedQueues::default(),
                port: CompletionPort::with_signal(signal.clone()),
                inbox: MessageInbox::with_signal(signal.clone()),
                state: AtomicU8::new(DispatcherState::Uninitialized as u8),
                signal: signal,
                polling_interval: config.polling_interval(),
                worker_thread: OnceLock::new(),
            }
        );

        // ...and the stats channel...
        let (publisher, monitor) = stats::channel(&DispatcherStats::default());

        // ...then bring up the worker thread
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.stack_size)
            .spawn(move || run_worker(worker_shared, hook, publisher))
            .map_err(|source| DispatcherError::WorkerSpawn {
                name: config.thread_name.clone(),
                source,
            })?;
        info!("Started task dispatcher thread '{}' (polling every {:?})",
              config.thread_name, config.polling_interval());

        Ok(Dispatcher {
            shared: shared,
            owner: OwnerThread::current(),
            worker: Some(worker),
            stats: monitor,
        })
    }

    /// Queue a task which must only start once every serial task submitted
    /// before it has completed
    ///
    /// Returns false if a stop was already requested. The task is then
    /// dropped without being ticked, since the worker will never get to it.
    ///
    pub fn submit_serial(&self, task: BoxedTask) -> bool {
        self.owner.check("Dispatcher::submit_serial");
        if !self.accepts_tasks(&task) {
            return false;
        }
        trace!("Submitting serial task {}", task);
        (&self.shared.queues).push_serial(task);
        self.shared.wake();
        true
    }

    /// Queue a task which progresses independently of all other tasks
    ///
    /// Returns false if a stop was already requested, like submit_serial().
    ///
    pub fn submit_parallel(&self, task: BoxedTask) -> bool {
        self.owner.check("Dispatcher::submit_parallel");
        if !self.accepts_tasks(&task) {
            return false;
        }
        trace!("Submitting parallel task {}", task);
        (&self.shared.queues).push_parallel(task);
        self.shared.wake();
        true
    }

    /// Finalize every completed task and trigger its delegates, in completion
    /// order. Meant to be called once per frame. Returns the number of tasks
    /// which were processed.
    ///
    /// Once the worker has exited, items pushed through completion ports are
    /// forwarded from here instead.
    ///
    pub fn game_tick(&self) -> usize {
        self.owner.check("Dispatcher::game_tick");
        if self.shared.state() == DispatcherState::Exited {
            self.shared.port.forward(&mut &self.shared.queues);
        }
        queues::drain_completed(&mut &self.shared.queues)
    }

    /// Handle which can be used to push already-completed tasks
    pub fn completion_port(&self) -> CompletionPort {
        self.shared.port.clone()
    }

    /// Handle which can be used to send messages to the worker thread
    pub fn message_sender(&self) -> MessageSender {
        self.shared.inbox.sender()
    }

    /// Ask the worker to stop after its next wake-up. Does not wait.
    pub fn stop(&self) {
        self.owner.check("Dispatcher::stop");
        info!("Stopping task dispatcher");
        self.shared.request_stop();
    }

    /// Wait for the worker to exit. Only returns once stop() was called, or
    /// if the worker thread panicked.
    pub fn join(&mut self) {
        self.owner.check("Dispatcher::join");
        self.join_worker();
    }

    /// Current lifecycle state
    pub fn state(&self) -> DispatcherState {
        self.shared.state()
    }

    /// Identity of the worker thread, once it has started
    pub fn worker_thread(&self) -> Option<ThreadId> {
        self.shared.worker_thread.get().copied()
    }

    /// Latest activity snapshot published by the worker. Does not take any
    /// task container lock.
    pub fn stats(&mut self) -> &DispatcherStats {
        self.stats.read()
    }

    /// Number of tasks waiting in the serial queue
    pub fn serial_len(&self) -> usize {
        self.shared.queues.serial_len()
    }

    /// Number of tasks in the parallel set
    pub fn parallel_len(&self) -> usize {
        self.shared.queues.parallel_len()
    }

    /// Number of tasks waiting for game_tick()
    pub fn completed_len(&self) -> usize {
        self.shared.queues.completed_len()
    }

    /// Submissions are refused once a stop was requested. Only the owner
    /// thread can request a stop, so this cannot race with one.
    fn accepts_tasks(&self, task: &BoxedTask) -> bool {
        match self.shared.state() {
            DispatcherState::StopRequested | DispatcherState::Exited => {
                warn!("Dropping task {} submitted after the task dispatcher was \
                       stopped", task);
                false
            },
            DispatcherState::Uninitialized | DispatcherState::Running => true,
        }
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Task dispatcher worker thread panicked");
                self.shared.set_state(DispatcherState::Exited);
            }
        }
    }
}
//
impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shared.request_stop();
        self.join_worker();
        let undelivered = self.shared.queues.completed_len() + self.shared.port.len();
        if undelivered > 0 {
            warn!("Dropping {} completed task(s) which were never finalized",
                  undelivered);
        }
    }
}


/// Worker thread main loop
fn run_worker<H: MaintenanceHook>(shared: Arc<SharedState>,
                                  mut hook: H,
                                  mut publisher: StatsPublisher) {
    let _ = shared.worker_thread.set(thread::current().id());

    // Only start running if nobody asked us to stop in the meantime
    let started = shared.state.compare_exchange(
        DispatcherState::Uninitialized as u8,
        DispatcherState::Running as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
    ).is_ok();

    let mut iterations = 0;
    let mut completed = 0;
    let mut messages = 0;
    if started {
        publisher.publish(shared.snapshot(iterations, completed, messages));
        let mut last_iteration = Instant::now();
        loop {
            shared.wait();
            debug_assert_eq!(shared.worker_thread.get().copied(),
                             Some(thread::current().id()),
                             "tasks must be ticked from the worker thread");
            let stopping = shared.state() != DispatcherState::Running;
            if !stopping {
                hook.online_tick();
            }
            messages += shared.inbox.process_all() as u64;
            shared.port.forward(&mut &shared.queues);

            let now = Instant::now();
            let delta = now - last_iteration;
            last_iteration = now;
            completed += queues::drain_iteration(&mut &shared.queues, delta) as u64;
            iterations += 1;
            publisher.publish(shared.snapshot(iterations, completed, messages));

            if stopping {
                break;
            }
        }
    }

    // Whatever did not complete is dropped without notification
    let (serial, parallel) = shared.queues.discard_pending();
    if serial + parallel > 0 {
        warn!("Task dispatcher exiting, dropped {} serial and {} parallel \
               pending task(s) without completion",
              serial, parallel);
    }
    let dropped_messages = shared.inbox.close();
    if dropped_messages > 0 {
        warn!("Task dispatcher exiting, dropped {} unprocessed message(s)",
              dropped_messages);
    }
    shared.set_state(DispatcherState::Exited);
    publisher.publish(shared.snapshot(iterations, completed, messages));
    info!("Task dispatcher thread exited after {} iteration(s)", iterations);
}
