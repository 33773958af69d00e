//! Task containers and their scheduling disciplines
//!
//! The dispatcher juggles three containers:
//!
//! - The serial queue, where only the head task may be in flight. A task gets
//!   to run only once every task submitted before it has completed.
//! - The parallel set, where every task progresses independently.
//! - The completion queue, where done tasks wait for the owner thread to
//!   finalize them, in the order in which their completion was discovered.
//!
//! The drain algorithms below are written once against the TaskQueues trait,
//! and used both by the threaded dispatcher (one lock per container) and by
//! the cooperative dispatcher (no locking at all), so that both scheduling
//! models provide the very same ordering guarantees.
//!
//! No lock is ever held while a task is being ticked. A task being ticked is
//! temporarily moved out of its container, and moved back if not done yet.

use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::task::{BoxedTask, TickContext};


/// Storage backend of the dispatcher's three containers
pub(crate) trait TaskQueues {
    /// Append a task to the tail of the serial queue
    fn push_serial(&mut self, task: BoxedTask);

    /// Move the head of the serial queue out, if any
    fn pop_serial_head(&mut self) -> Option<BoxedTask>;

    /// Put an unfinished head task back at the front of the serial queue
    fn restore_serial_head(&mut self, task: BoxedTask);

    /// Insert a task into the parallel set
    fn push_parallel(&mut self, task: BoxedTask);

    /// Move the whole live parallel membership out
    fn take_parallel(&mut self) -> Vec<BoxedTask>;

    /// Move unfinished tasks back into the parallel set, ahead of any task
    /// which was inserted while they were out
    fn restore_parallel(&mut self, survivors: Vec<BoxedTask>);

    /// Append a done task to the completion queue
    fn push_completed(&mut self, task: BoxedTask);

    /// Move the oldest done task out of the completion queue, if any
    fn pop_completed(&mut self) -> Option<BoxedTask>;
}


/// Containers for single-threaded use, with no locking
#[derive(Default)]
pub(crate) struct LocalQueues {
    serial: VecDeque<BoxedTask>,
    parallel: Vec<BoxedTask>,
    completed: VecDeque<BoxedTask>,
}
//
impl LocalQueues {
    pub fn serial_len(&self) -> usize {
        self.serial.len()
    }

    pub fn parallel_len(&self) -> usize {
        self.parallel.len()
    }

    #[cfg(test)]
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }
}
//
impl TaskQueues for LocalQueues {
    fn push_serial(&mut self, task: BoxedTask) {
        self.serial.push_back(task);
    }

    fn pop_serial_head(&mut self) -> Option<BoxedTask> {
        self.serial.pop_front()
    }

    fn restore_serial_head(&mut self, task: BoxedTask) {
        self.serial.push_front(task);
    }

    fn push_parallel(&mut self, task: BoxedTask) {
        self.parallel.push(task);
    }

    fn take_parallel(&mut self) -> Vec<BoxedTask> {
        std::mem::take(&mut self.parallel)
    }

    fn restore_parallel(&mut self, mut survivors: Vec<BoxedTask>) {
        survivors.append(&mut self.parallel);
        self.parallel = survivors;
    }

    fn push_completed(&mut self, task: BoxedTask) {
        self.completed.push_back(task);
    }

    fn pop_completed(&mut self) -> Option<BoxedTask> {
        self.completed.pop_front()
    }
}


/// Containers shared between the owner and worker threads
///
/// Each container has its own lock, so that contention on one of them never
/// blocks access to the others.
///
#[derive(Default)]
pub(crate) struct SharedQueues {
    serial: Mutex<VecDeque<BoxedTask>>,
    parallel: Mutex<Vec<BoxedTask>>,
    completed: Mutex<VecDeque<BoxedTask>>,
}
//
impl SharedQueues {
    pub fn serial_len(&self) -> usize {
        self.serial.lock().len()
    }

    pub fn parallel_len(&self) -> usize {
        self.parallel.lock().len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.lock().len()
    }

    /// Drop every task waiting in the serial queue and in the parallel set,
    /// returning how many were dropped from each
    pub fn discard_pending(&self) -> (usize, usize) {
        let serial = std::mem::take(&mut *self.serial.lock());
        let parallel = std::mem::take(&mut *self.parallel.lock());
        (serial.len(), parallel.len())
    }
}
//
// Every method only needs shared access, so the trait is implemented on
// shared references and each call takes exactly one lock.
impl<'a> TaskQueues for &'a SharedQueues {
    fn push_serial(&mut self, task: BoxedTask) {
        self.serial.lock().push_back(task);
    }

    fn pop_serial_head(&mut self) -> Option<BoxedTask> {
        self.serial.lock().pop_front()
    }

    fn restore_serial_head(&mut self, task: BoxedTask) {
        self.serial.lock().push_front(task);
    }

    fn push_parallel(&mut self, task: BoxedTask) {
        self.parallel.lock().push(task);
    }

    fn take_parallel(&mut self) -> Vec<BoxedTask> {
        std::mem::take(&mut *self.parallel.lock())
    }

    fn restore_parallel(&mut self, mut survivors: Vec<BoxedTask>) {
        let mut parallel = self.parallel.lock();
        survivors.append(&mut parallel);
        *parallel = survivors;
    }

    fn push_completed(&mut self, task: BoxedTask) {
        self.completed.lock().push_back(task);
    }

    fn pop_completed(&mut self) -> Option<BoxedTask> {
        self.completed.lock().pop_front()
    }
}


/// Tick a task once, then file whatever it spawned
fn tick_task<Q: TaskQueues>(queues: &mut Q, task: &mut BoxedTask, delta: Duration) {
    let mut ctx = TickContext::new(delta);
    task.tick(&mut ctx);
    let (parallel, serial) = ctx.take_spawned();
    for spawned in parallel {
        queues.push_parallel(spawned);
    }
    for spawned in serial {
        queues.push_serial(spawned);
    }
}


/// Hand a done task over to the completion queue
fn complete<Q: TaskQueues>(queues: &mut Q, task: BoxedTask) {
    debug_assert!(task.is_done());
    debug!("Task {} completed (success: {}) after {:?}",
           task, task.was_successful(), task.elapsed());
    queues.push_completed(task);
}


/// Tick every member of the parallel set once
///
/// The live membership is moved out before ticking, so tasks inserted while
/// this runs (including those spawned by the tasks being ticked) are left for
/// the next iteration. Returns the number of tasks which completed.
///
pub(crate) fn drain_parallel<Q: TaskQueues>(queues: &mut Q, delta: Duration) -> usize {
    let snapshot = queues.take_parallel();
    if snapshot.is_empty() {
        return 0;
    }

    let mut survivors = Vec::with_capacity(snapshot.len());
    let mut completed = 0;
    for mut task in snapshot {
        tick_task(queues, &mut task, delta);
        if task.is_done() {
            complete(queues, task);
            completed += 1;
        } else {
            survivors.push(task);
        }
    }

    queues.restore_parallel(survivors);
    completed
}


/// Tick the head of the serial queue until one of them is not done
///
/// Tasks which complete synchronously let the next one start within the same
/// call, but at most one serial task is ever in flight. Returns the number of
/// tasks which completed.
///
pub(crate) fn drain_serial<Q: TaskQueues>(queues: &mut Q, delta: Duration) -> usize {
    let mut completed = 0;
    while let Some(mut head) = queues.pop_serial_head() {
        tick_task(queues, &mut head, delta);
        if head.is_done() {
            complete(queues, head);
            completed += 1;
        } else {
            queues.restore_serial_head(head);
            break;
        }
    }
    completed
}


/// One dispatcher iteration worth of task ticking: parallel set first, then
/// the serial queue. Returns the number of tasks which completed.
pub(crate) fn drain_iteration<Q: TaskQueues>(queues: &mut Q, delta: Duration) -> usize {
    let completed = drain_parallel(queues, delta) + drain_serial(queues, delta);
    trace!("Dispatcher iteration completed {} task(s)", completed);
    completed
}


/// Finalize every task in the completion queue, trigger its delegates, and
/// destroy it. Returns the number of tasks processed.
pub(crate) fn drain_completed<Q: TaskQueues>(queues: &mut Q) -> usize {
    let mut processed = 0;
    while let Some(mut task) = queues.pop_completed() {
        task.finalize();
        task.trigger_delegates();
        processed += 1;
    }
    processed
}


/// Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountdownTask, Journal};

    const DT: Duration = Duration::from_millis(10);

    /// Only the head of the serial queue may be ticked
    #[test]
    fn serial_exclusivity() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        queues.push_serial(CountdownTask::new("T1", 0, &journal).boxed());
        queues.push_serial(CountdownTask::new("T2", 1, &journal).boxed());

        for _ in 0..5 {
            assert_eq!(drain_serial(&mut queues, DT), 0);
        }
        assert_eq!(journal.count("tick", "T1"), 5);
        assert_eq!(journal.count("tick", "T2"), 0);
        assert_eq!(queues.serial_len(), 2);
    }

    /// Synchronously completing serial tasks are all drained in one call
    #[test]
    fn serial_chaining() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        for name in &["Login", "ReadFriends", "ReadAchievements"] {
            queues.push_serial(CountdownTask::new(name, 1, &journal).boxed());
        }
        queues.push_serial(CountdownTask::new("Slow", 2, &journal).boxed());

        assert_eq!(drain_serial(&mut queues, DT), 3);
        assert_eq!(queues.serial_len(), 1);
        assert_eq!(queues.completed_len(), 3);
        assert_eq!(journal.events("tick"),
                   vec!["Login", "ReadFriends", "ReadAchievements", "Slow"]);
    }

    /// Parallel tasks complete in the order in which they finish
    #[test]
    fn parallel_independence() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        queues.push_parallel(CountdownTask::new("Ping", 3, &journal).boxed());
        queues.push_parallel(CountdownTask::new("Fetch", 1, &journal).boxed());

        assert_eq!(drain_parallel(&mut queues, DT), 1);
        assert_eq!(drain_parallel(&mut queues, DT), 0);
        assert_eq!(drain_parallel(&mut queues, DT), 1);
        assert_eq!(queues.parallel_len(), 0);

        assert_eq!(drain_completed(&mut queues), 2);
        assert_eq!(journal.events("delegates"), vec!["Fetch", "Ping"]);
    }

    /// A task spawned while the parallel set is being ticked waits for the
    /// next iteration
    #[test]
    fn snapshot_deferral() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        let child = CountdownTask::new("Child", 1, &journal).boxed();
        queues.push_parallel(
            CountdownTask::new("Parent", 2, &journal).spawning(child).boxed()
        );

        assert_eq!(drain_parallel(&mut queues, DT), 0);
        assert_eq!(journal.count("tick", "Child"), 0);
        assert_eq!(queues.parallel_len(), 2);

        assert_eq!(drain_parallel(&mut queues, DT), 2);
        assert_eq!(journal.events("tick"), vec!["Parent", "Parent", "Child"]);
    }

    /// Same thing when going through the lock-partitioned containers
    #[test]
    fn shared_snapshot_deferral() {
        let journal = Journal::new();
        let shared = SharedQueues::default();
        let child = CountdownTask::new("Child", 1, &journal).boxed();
        (&shared).push_parallel(
            CountdownTask::new("Parent", 0, &journal).spawning(child).boxed()
        );

        assert_eq!(drain_iteration(&mut &shared, DT), 0);
        assert_eq!(journal.count("tick", "Child"), 0);
        assert_eq!(drain_iteration(&mut &shared, DT), 1);
        assert_eq!(shared.parallel_len(), 1);
        assert_eq!(shared.completed_len(), 1);
    }

    /// Within an iteration, parallel completions are discovered first
    #[test]
    fn discovery_order() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        queues.push_serial(CountdownTask::new("Serial", 1, &journal).boxed());
        queues.push_parallel(CountdownTask::new("Parallel", 1, &journal).boxed());

        assert_eq!(drain_iteration(&mut queues, DT), 2);
        assert_eq!(drain_completed(&mut queues), 2);
        assert_eq!(journal.events("delegates"), vec!["Parallel", "Serial"]);
    }

    /// Finalize and delegates run exactly once, in that order, then the task
    /// is destroyed
    #[test]
    fn completion_lifecycle() {
        let journal = Journal::new();
        let mut queues = LocalQueues::default();
        queues.push_serial(CountdownTask::new("Login", 1, &journal).failing().boxed());

        drain_iteration(&mut queues, DT);
        assert_eq!(journal.count("finalize", "Login"), 0);
        assert_eq!(drain_completed(&mut queues), 1);
        assert_eq!(drain_completed(&mut queues), 0);
        assert_eq!(journal.count("finalize", "Login"), 1);
        assert_eq!(journal.count("delegates", "Login"), 1);
        assert_eq!(journal.count("drop", "Login"), 1);
    }

    /// Discarding pending tasks drops them without any completion
    #[test]
    fn discard_pending() {
        let journal = Journal::new();
        let shared = SharedQueues::default();
        (&shared).push_serial(CountdownTask::new("A", 1, &journal).boxed());
        (&shared).push_serial(CountdownTask::new("B", 1, &journal).boxed());
        (&shared).push_parallel(CountdownTask::new("C", 1, &journal).boxed());

        assert_eq!(shared.discard_pending(), (2, 1));
        assert_eq!(shared.serial_len() + shared.parallel_len(), 0);
        assert!(journal.events("finalize").is_empty());
        assert_eq!(journal.events("drop").len(), 3);
    }
}
