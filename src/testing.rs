//! Instrumented tasks shared by the unit tests

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::status::TaskState;
use crate::task::{AsyncTask, BoxedTask, TickContext};


/// Thread-safe record of everything that happened to a set of tasks
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);
//
impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &str, name: &str) {
        self.0.lock().push(format!("{}:{}", event, name));
    }

    /// Names of the tasks which went through some event, in order
    pub fn events(&self, event: &str) -> Vec<String> {
        let prefix = format!("{}:", event);
        self.0.lock()
              .iter()
              .filter_map(|e| e.strip_prefix(&prefix).map(str::to_owned))
              .collect()
    }

    /// Number of times a given task went through some event
    pub fn count(&self, event: &str, name: &str) -> usize {
        self.events(event).iter().filter(|n| *n == name).count()
    }
}


/// Task which completes after a fixed number of ticks
pub struct CountdownTask {
    name: String,
    state: TaskState,
    ticks_needed: u64,
    success: bool,
    child: Option<BoxedTask>,
    journal: Journal,
}
//
impl CountdownTask {
    /// Build a task which is done after `ticks_needed` ticks (0 = never)
    pub fn new(name: &str, ticks_needed: u64, journal: &Journal) -> Self {
        CountdownTask {
            name: name.to_owned(),
            state: TaskState::new(),
            ticks_needed: ticks_needed,
            success: true,
            child: None,
            journal: journal.clone(),
        }
    }

    /// Make the task report failure once done
    pub fn failing(mut self) -> Self {
        self.success = false;
        self
    }

    /// Spawn a parallel child task during the first tick
    pub fn spawning(mut self, child: BoxedTask) -> Self {
        self.child = Some(child);
        self
    }

    pub fn boxed(self) -> BoxedTask {
        Box::new(self)
    }
}
//
impl AsyncTask for CountdownTask {
    fn tick(&mut self, ctx: &mut TickContext) {
        assert!(!self.is_done(), "{} ticked after completion", self.name);
        self.journal.record("tick", &self.name);
        self.state.record_tick();
        if let Some(child) = self.child.take() {
            ctx.spawn_parallel(child);
        }
        if self.state.ticks() == self.ticks_needed {
            self.state.complete(self.success);
        }
    }

    fn is_done(&self) -> bool {
        self.state.status().is_done()
    }

    fn was_successful(&self) -> bool {
        self.state.status().was_successful()
    }

    fn finalize(&mut self) {
        assert!(self.is_done(), "{} finalized before completion", self.name);
        self.journal.record("finalize", &self.name);
    }

    fn trigger_delegates(&mut self) {
        self.journal.record("delegates", &self.name);
    }

    fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }
}
//
impl fmt::Display for CountdownTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
//
impl Drop for CountdownTask {
    fn drop(&mut self) {
        self.journal.record("drop", &self.name);
    }
}
