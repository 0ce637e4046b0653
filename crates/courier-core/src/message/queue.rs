//! Cancellable FIFO queue with blocking consumption.
//!
//! `push` never blocks and never fails. `pop` returns the next buffered item
//! or waits for one. `close` is terminal: pending and future `pop` calls get
//! `None` once the buffer is drained, and later pushes are dropped.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

struct QueueState<T> {
    buffer: VecDeque<T>,
    /// Waiters parked in `pop`, oldest first.
    waiters: VecDeque<oneshot::Sender<Option<T>>>,
    closed: bool,
}

/// A multi-producer, multi-consumer FIFO with an explicit close signal.
///
/// `None` from [`pop`](Self::pop) is the only cancellation signal: callers
/// stop consuming when they see it.
pub struct CancellableQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> CancellableQueue<T> {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                buffer: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // The state is never left half-updated across a panic point.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item, handing it straight to a waiting consumer if any.
    ///
    /// Silently dropped after [`close`](Self::close).
    pub fn push(&self, item: T) {
        let mut state = self.lock();
        if state.closed {
            return;
        }

        if let Some(item) = hand_off(&mut state, item) {
            state.buffer.push_back(item);
        }
    }

    /// Take the next item, waiting until one is pushed or the queue closes.
    ///
    /// Items buffered before `close` are still returned in order; afterwards
    /// every call returns `None` immediately.
    pub async fn pop(&self) -> Option<T> {
        let rx = {
            let mut state = self.lock();
            if let Some(item) = state.buffer.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut guard = WaiterGuard { rx: Some(rx), queue: self };
        let received = match guard.rx.as_mut() {
            Some(rx) => rx.await,
            None => return None,
        };
        guard.rx = None;
        received.unwrap_or(None)
    }

    /// Take the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().buffer.pop_front()
    }

    /// Close the queue and wake every pending `pop` with `None`. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(None);
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Whether no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for CancellableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CancellableQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CancellableQueue")
            .field("buffered", &state.buffer.len())
            .field("waiters", &state.waiters.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Give `item` to the oldest live waiter, or return it when none accepts.
fn hand_off<T>(state: &mut QueueState<T>, mut item: T) -> Option<T> {
    while let Some(waiter) = state.waiters.pop_front() {
        match waiter.send(Some(item)) {
            Ok(()) | Err(None) => return None,
            // The waiting `pop` future was dropped; try the next one.
            Err(Some(returned)) => item = returned,
        }
    }
    Some(item)
}

/// Re-delivers an item that raced into a `pop` future dropped mid-wait.
///
/// The item goes to the next parked waiter first so it is never overtaken
/// by a later push.
struct WaiterGuard<'a, T> {
    rx: Option<oneshot::Receiver<Option<T>>>,
    queue: &'a CancellableQueue<T>,
}

impl<T> Drop for WaiterGuard<'_, T> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        rx.close();
        if let Ok(Some(item)) = rx.try_recv() {
            let mut state = self.queue.lock();
            if let Some(item) = hand_off(&mut state, item) {
                state.buffer.push_front(item);
            }
        }
    }
}
