//! Inbound messages for the worker context
//!
//! Not everything the owner thread needs done on the worker side is a task.
//! Forwarding a packet to the online service, or updating some connection
//! setting, is a one-shot action: it does not need to be ticked, and nobody
//! waits for its completion. Such actions are sent as messages.
//!
//! Messages are processed exactly once, from the context which ticks tasks,
//! right after the maintenance hook and before any task is ticked. They are
//! processed in the order in which they were sent. A message sent while
//! messages are being processed waits for the next iteration.
//!
//! Once the dispatcher is gone, the inbox is closed: messages which were
//! still waiting are dropped unprocessed, and later sends are refused.

use log::{trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::dispatcher::WakeSignal;


/// One-shot action to be carried out from the context which ticks tasks
pub trait WorkerMessage: Send + fmt::Display {
    /// Carry out the action. Consumes the message.
    fn process(self: Box<Self>);
}

pub type BoxedMessage = Box<dyn WorkerMessage>;


/// Message backed by a closure
pub struct FnMessage {
    description: String,
    handler: Box<dyn FnOnce() + Send>,
}
//
impl FnMessage {
    pub fn new<F>(description: &str, handler: F) -> Self
        where F: FnOnce() + Send + 'static
    {
        FnMessage {
            description: description.to_owned(),
            handler: Box::new(handler),
        }
    }
}
//
impl WorkerMessage for FnMessage {
    fn process(self: Box<Self>) {
        let handler = self.handler;
        handler()
    }
}
//
impl fmt::Display for FnMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FnMessage({})", self.description)
    }
}


/// Messages waiting for processing, and whether more are accepted
#[derive(Default)]
struct MessageQueue {
    messages: VecDeque<BoxedMessage>,
    closed: bool,
}


/// State shared by the inbox and its senders
#[derive(Default)]
struct SharedInbox {
    queue: Mutex<MessageQueue>,
    signal: Option<Arc<WakeSignal>>,
}


/// Cloneable handle used to send messages to a dispatcher's worker context
#[derive(Clone)]
pub struct MessageSender {
    shared: Arc<SharedInbox>,
}
//
impl MessageSender {
    /// Queue a message for processing. Can be called from any thread.
    ///
    /// Returns false if the dispatcher has already exited, in which case the
    /// message is dropped without being processed.
    ///
    pub fn send(&self, message: BoxedMessage) -> bool {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                warn!("Dropping message {} sent after the task dispatcher exited",
                      message);
                return false;
            }
            trace!("Queueing message {}", message);
            queue.messages.push_back(message);
        }
        if let Some(ref signal) = self.shared.signal {
            signal.notify();
        }
        true
    }

    /// Number of messages waiting for processing
    pub fn len(&self) -> usize {
        self.shared.queue.lock().messages.len()
    }

    /// Whether every message sent so far was processed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


/// Receiving side of the messages, owned by a dispatcher
pub(crate) struct MessageInbox {
    shared: Arc<SharedInbox>,
}
//
impl MessageInbox {
    /// Inbox of a dispatcher which has no worker to wake up
    pub fn new() -> Self {
        MessageInbox { shared: Arc::default() }
    }

    /// Inbox which wakes a worker thread up on every send
    pub fn with_signal(signal: Arc<WakeSignal>) -> Self {
        MessageInbox {
            shared: Arc::new(SharedInbox {
                queue: Mutex::default(),
                signal: Some(signal),
            })
        }
    }

    /// New handle for sending messages to this inbox
    pub fn sender(&self) -> MessageSender {
        MessageSender { shared: self.shared.clone() }
    }

    /// Process every message received so far, in order. No lock is held
    /// while processing.
    pub fn process_all(&self) -> usize {
        let messages = std::mem::take(&mut self.shared.queue.lock().messages);
        let count = messages.len();
        for message in messages {
            trace!("Processing message {}", message);
            message.process();
        }
        count
    }

    /// Refuse any further message, and drop the waiting ones. Returns how
    /// many messages were dropped.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            std::mem::take(&mut queue.messages)
        };
        dropped.len()
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> BoxedMessage {
        let log = log.clone();
        Box::new(FnMessage::new(name, move || log.lock().push(name.to_owned())))
    }

    /// Messages are processed once, in send order, even across threads
    #[test]
    fn fifo_processing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inbox = MessageInbox::new();
        let sender = inbox.sender();
        assert!(sender.send(recording("A", &log)));
        let remote = sender.clone();
        let l = log.clone();
        thread::spawn(move || assert!(remote.send(recording("B", &l)))).join().unwrap();
        assert_eq!(sender.len(), 2);

        assert_eq!(inbox.process_all(), 2);
        assert!(sender.is_empty());
        assert_eq!(*log.lock(), vec!["A", "B"]);
        assert_eq!(inbox.process_all(), 0);
        assert_eq!(log.lock().len(), 2);
    }

    /// A message sent while processing waits for the next round
    #[test]
    fn deferred_resend() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inbox = MessageInbox::new();
        let sender = inbox.sender();
        let (resender, l) = (sender.clone(), log.clone());
        sender.send(Box::new(FnMessage::new("First", move || {
            l.lock().push("First".to_owned());
            resender.send(recording("Second", &l));
        })));

        assert_eq!(inbox.process_all(), 1);
        assert_eq!(*log.lock(), vec!["First"]);
        assert_eq!(inbox.process_all(), 1);
        assert_eq!(*log.lock(), vec!["First", "Second"]);
    }

    /// Closing drops waiting messages, and refuses new ones
    #[test]
    fn close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inbox = MessageInbox::new();
        let sender = inbox.sender();
        sender.send(recording("Waiting", &log));
        assert_eq!(inbox.close(), 1);
        assert!(!sender.send(recording("Late", &log)));
        assert_eq!(inbox.process_all(), 0);
        assert!(log.lock().is_empty());
    }

    /// Sending wakes up whoever waits on the inbox's signal
    #[test]
    fn send_wakes() {
        let signal = Arc::new(WakeSignal::default());
        let inbox = MessageInbox::with_signal(signal.clone());
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            signal.wait_for(Duration::from_secs(30));
            start.elapsed()
        });
        thread::sleep(Duration::from_millis(10));
        inbox.sender().send(Box::new(FnMessage::new("Ping", || {})));
        assert!(waiter.join().unwrap() < Duration::from_secs(20));
    }
}
