//! Inbound dispatch loop.
//!
//! Pulls messages off the bus and spawns one task per message. Tasks for
//! the same conversation key run one at a time in arrival order (through
//! [`KeyedSerializer`]); tasks for different keys run concurrently. `/stop`
//! bypasses the chain and cancels every queued and running task for its key.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_types::message::{InboundMessage, OutboundMessage};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::serializer::KeyedSerializer;
use crate::agent::commands::Command;
use crate::message::{MessageBus, MessageProcessor};

type ActiveTasks = DashMap<String, Vec<(u64, CancellationToken)>>;

/// Drives a [`MessageProcessor`] from the inbound queue.
pub struct Dispatcher<P: MessageProcessor> {
    bus: Arc<MessageBus>,
    processor: Arc<P>,
    serializer: KeyedSerializer,
    active: Arc<ActiveTasks>,
    tracker: TaskTracker,
    next_task: AtomicU64,
}

impl<P: MessageProcessor> Dispatcher<P> {
    pub fn new(bus: Arc<MessageBus>, processor: Arc<P>) -> Self {
        Self {
            bus,
            processor,
            serializer: KeyedSerializer::new(),
            active: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
            next_task: AtomicU64::new(0),
        }
    }

    /// Consume inbound messages until the bus closes, then wait for every
    /// spawned task to finish.
    ///
    /// Messages buffered before the close are still dispatched.
    pub async fn run(&self) {
        info!("dispatcher started");
        while let Some(message) = self.bus.consume_inbound().await {
            self.dispatch(message);
        }

        self.tracker.close();
        debug!(in_flight = self.tracker.len(), "bus closed, waiting for tasks");
        self.tracker.wait().await;
        info!("dispatcher stopped");
    }

    /// Route one message: `/stop` runs inline, everything else is spawned
    /// behind the key's chain.
    pub fn dispatch(&self, message: InboundMessage) {
        if Command::parse(&message.content) == Some(Command::Stop) {
            self.stop(&message);
            return;
        }

        let key = message.session_key();
        let mut ticket = self.serializer.enqueue(&key);
        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.active
            .entry(key.clone())
            .or_default()
            .push((id, token.clone()));

        let registration = Registration {
            active: Arc::clone(&self.active),
            key: key.clone(),
            id,
        };
        let processor = Arc::clone(&self.processor);

        self.tracker.spawn(async move {
            let _registration = registration;

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_key = %key, "task cancelled while queued");
                    return;
                }
                _ = ticket.wait_turn() => {}
            }

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_key = %key, "task cancelled while running");
                }
                _ = processor.process(message, token.clone()) => {}
            }
            drop(ticket);
        });
    }

    /// Cancel every task for the message's key and report how many stopped.
    fn stop(&self, message: &InboundMessage) {
        let key = message.session_key();
        let stopped = match self.active.remove(&key) {
            Some((_, tasks)) => {
                for (_, token) in &tasks {
                    token.cancel();
                }
                tasks.len()
            }
            None => 0,
        };

        info!(session_key = %key, stopped, "stop requested");
        let reply = if stopped == 0 {
            "No active task to stop.".to_string()
        } else {
            format!("Stopped {stopped} task(s).")
        };
        self.bus
            .publish_outbound(OutboundMessage::reply_to(message, reply));
    }

    /// Number of tasks queued or running across all keys.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

/// Removes a task's cancellation token when the task ends.
struct Registration {
    active: Arc<ActiveTasks>,
    key: String,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(mut tasks) = self.active.get_mut(&self.key) {
            tasks.retain(|(id, _)| *id != self.id);
        }
        self.active.remove_if(&self.key, |_, tasks| tasks.is_empty());
    }
}
