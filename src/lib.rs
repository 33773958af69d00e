//! Asynchronous task dispatching
//!
//! Picture yourself in a situation where: your application talks to an online
//! service, and every call to that service takes a while to complete. Logging
//! in, fetching a friend list, reading achievements... You cannot afford to
//! block your main loop on any of these, yet you want their results to be
//! delivered on your main thread, where the rest of your application state
//! lives, and sometimes you need them to happen in a well-defined order.
//!
//! This crate provides a task dispatcher for this situation. The thread which
//! owns the dispatcher submits tasks to it. Tasks are ticked until done, either
//! on a worker thread or cooperatively, then handed back to the owner thread
//! which finalizes them and triggers their completion delegates.
//!
//! Two scheduling disciplines are available:
//!
//! - Serial tasks run one at a time, in submission order, so their delegates
//!   fire in submission order too.
//! - Parallel tasks progress independently, and are delivered in the order in
//!   which they complete.
//!
//! One-shot actions which do not need ticking can also be sent to the
//! dispatcher as messages, and items which are already complete can be handed
//! straight to the owner thread through a completion port.

pub mod callback;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod inbox;
pub mod port;
mod queues;
pub mod stats;
pub mod status;
pub mod task;

#[cfg(test)]
mod testing;

pub use callback::{FnTask, TaskFailure, TaskResult};
pub use config::DispatcherConfig;
pub use dispatcher::cooperative::CooperativeDispatcher;
pub use dispatcher::threaded::Dispatcher;
pub use dispatcher::{DispatcherState, MaintenanceHook, NoMaintenance};
pub use error::{ConfigError, DispatcherError};
pub use inbox::{BoxedMessage, FnMessage, MessageSender, WorkerMessage};
pub use port::CompletionPort;
pub use stats::DispatcherStats;
pub use status::{TaskState, TaskStatus};
pub use task::{AsyncTask, BoxedTask, TickContext};
