//! Per-key FIFO chaining.
//!
//! Each conversation key maps to the completion receiver of its most recent
//! task (the tail). A new task takes the previous tail's receiver, installs
//! its own, and waits on the predecessor before running. A task that
//! finishes while still being the tail removes the map entry, so idle keys
//! cost nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;

struct Tail {
    seq: u64,
    done: oneshot::Receiver<()>,
}

/// Serializes work per key while leaving different keys independent.
#[derive(Default)]
pub struct KeyedSerializer {
    tails: Arc<DashMap<String, Tail>>,
    next_seq: AtomicU64,
}

impl KeyedSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next place in `key`'s chain.
    ///
    /// Must be called in arrival order; the returned ticket runs after every
    /// ticket previously enqueued for the same key.
    pub fn enqueue(&self, key: &str) -> Ticket {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let tail = Tail { seq, done: rx };

        let predecessor = match self.tails.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => Some(std::mem::replace(occupied.get_mut(), tail).done),
            Entry::Vacant(vacant) => {
                vacant.insert(tail);
                None
            }
        };

        Ticket {
            key: key.to_string(),
            seq,
            predecessor,
            completion: Some(tx),
            tails: Arc::clone(&self.tails),
        }
    }

    /// Number of keys with a queued or running ticket.
    pub fn active_keys(&self) -> usize {
        self.tails.len()
    }
}

impl std::fmt::Debug for KeyedSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedSerializer")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}

/// One place in a key's chain. Dropping it releases the successor.
pub struct Ticket {
    key: String,
    seq: u64,
    predecessor: Option<oneshot::Receiver<()>>,
    completion: Option<oneshot::Sender<()>>,
    tails: Arc<DashMap<String, Tail>>,
}

impl Ticket {
    /// Wait until every earlier ticket for this key has been dropped.
    pub async fn wait_turn(&mut self) {
        if let Some(predecessor) = self.predecessor.as_mut() {
            // A dropped sender also means the predecessor is finished.
            let _ = predecessor.await;
        }
        self.predecessor = None;
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(());
        }
        let seq = self.seq;
        self.tails.remove_if(&self.key, |_, tail| tail.seq == seq);
    }
}
