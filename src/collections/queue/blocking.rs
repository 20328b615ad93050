/*!
 * Bounded Blocking Queue
 *
 * Multi-producer multi-consumer FIFO guarded by a single lock with two
 * condition variables (`not_empty`, `not_full`). Waits re-check their
 * condition in a loop and never hold the lock while parked.
 *
 * # Wait outcomes
 *
 * A blocked call ends in exactly one way, checked in this order each time
 * it wakes: the queue is closed, the operation can proceed, the token was
 * cancelled, or the deadline passed. Cancellation and timeout are reported
 * separately.
 */

use super::config::QueueConfig;
use super::types::{PutError, QueueState, QueueStats, TrySendError};
use crate::core::errors::ConfigResult;
use crate::core::sync::{park, CancellationToken, Deadline, WaitError, WaitResult, Wake};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    total_put: u64,
    total_taken: u64,
    timeouts: u64,
    cancellations: u64,
    waiting_producers: usize,
    waiting_consumers: usize,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> Shared<T> {
    #[inline]
    fn is_full(&self, state: &State<T>) -> bool {
        self.capacity.is_some_and(|cap| state.items.len() >= cap)
    }
}

impl<T: Send> Wake for Shared<T> {
    fn wake(&self) {
        // Taking the lock orders this wake after any waiter's cancel check
        let _state = self.state.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/// Bounded MPMC blocking queue with strict FIFO order
///
/// Cloning produces another handle to the same queue.
///
/// # Example
///
/// ```
/// use striped_sync::BoundedBlockingQueue;
/// use std::time::Duration;
///
/// let queue = BoundedBlockingQueue::bounded(2).unwrap();
/// queue.put("a").unwrap();
/// queue.put("b").unwrap();
/// assert!(queue.try_send("c").is_err());
/// assert_eq!(queue.take(), Ok("a"));
/// assert_eq!(queue.take_timeout(Duration::from_millis(10)), Ok("b"));
/// ```
pub struct BoundedBlockingQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedBlockingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedBlockingQueue<T> {
    /// Queue holding at most `capacity` items (`capacity >= 1`)
    pub fn bounded(capacity: usize) -> ConfigResult<Self> {
        Self::with_config(QueueConfig::bounded(capacity))
    }

    /// Queue whose producers never block
    pub fn unbounded() -> Self {
        Self::build(QueueConfig::unbounded())
    }

    pub fn with_config(config: QueueConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                    total_put: 0,
                    total_taken: 0,
                    timeouts: 0,
                    cancellations: 0,
                    waiting_producers: 0,
                    waiting_consumers: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity: config.capacity,
            }),
        }
    }

    /// Enqueue, blocking while full
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.enqueue(item, &Deadline::never(), || false)
    }

    /// Enqueue, giving up after `timeout`; the item comes back on failure
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.enqueue(item, &Deadline::after(timeout), || false)
    }

    /// Dequeue, blocking while empty
    ///
    /// Fails only with `Closed`, once the queue is closed and drained.
    pub fn take(&self) -> WaitResult<T> {
        self.dequeue(&Deadline::never(), || false)
    }

    /// Dequeue, giving up after `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> WaitResult<T> {
        self.dequeue(&Deadline::after(timeout), || false)
    }

    /// Enqueue without blocking
    pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(TrySendError::Closed(item));
        }
        if self.shared.is_full(&state) {
            return Err(TrySendError::Full(item));
        }
        state.items.push_back(item);
        state.total_put += 1;
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue without blocking
    pub fn try_receive(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        let item = state.items.pop_front()?;
        state.total_taken += 1;
        self.shared.not_full.notify_one();
        Some(item)
    }

    fn enqueue<C>(&self, item: T, deadline: &Deadline, is_cancelled: C) -> Result<(), PutError<T>>
    where
        C: Fn() -> bool,
    {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return Err(PutError::Closed(item));
            }
            if !self.shared.is_full(&state) {
                state.items.push_back(item);
                state.total_put += 1;
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            if is_cancelled() {
                state.cancellations += 1;
                return Err(PutError::Cancelled(item));
            }
            if deadline.is_expired() {
                state.timeouts += 1;
                return Err(PutError::Timeout(item));
            }

            state.waiting_producers += 1;
            park(&self.shared.not_full, &mut state, deadline);
            state.waiting_producers -= 1;
        }
    }

    fn dequeue<C>(&self, deadline: &Deadline, is_cancelled: C) -> WaitResult<T>
    where
        C: Fn() -> bool,
    {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                state.total_taken += 1;
                self.shared.not_full.notify_one();
                return Ok(item);
            }
            if state.closed {
                return Err(WaitError::Closed);
            }
            if is_cancelled() {
                state.cancellations += 1;
                return Err(WaitError::Cancelled);
            }
            if deadline.is_expired() {
                state.timeouts += 1;
                return Err(WaitError::Timeout);
            }

            state.waiting_consumers += 1;
            park(&self.shared.not_empty, &mut state, deadline);
            state.waiting_consumers -= 1;
        }
    }

    /// Close the queue
    ///
    /// Blocked and future producers fail with `Closed`; consumers drain what
    /// is left, then fail with `Closed`. Returns false if already closed.
    pub fn close(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        debug!(
            remaining = state.items.len(),
            waiting_producers = state.waiting_producers,
            waiting_consumers = state.waiting_consumers,
            "Queue closed"
        );
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Remove and return every queued item
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.shared.state.lock();
        let items: Vec<T> = state.items.drain(..).collect();
        state.total_taken += items.len() as u64;
        if !items.is_empty() {
            self.shared.not_full.notify_all();
        }
        items
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().items.is_empty()
    }

    /// Maximum items, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Free slots, `None` if unbounded
    pub fn remaining_capacity(&self) -> Option<usize> {
        let len = self.len();
        self.shared.capacity.map(|cap| cap.saturating_sub(len))
    }

    pub fn state(&self) -> QueueState {
        let state = self.shared.state.lock();
        if state.items.is_empty() {
            QueueState::Empty
        } else if self.shared.is_full(&state) {
            QueueState::Full
        } else {
            QueueState::Partial
        }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock();
        QueueStats {
            len: state.items.len(),
            capacity: self.shared.capacity,
            closed: state.closed,
            total_put: state.total_put,
            total_taken: state.total_taken,
            timeouts: state.timeouts,
            cancellations: state.cancellations,
            waiting_producers: state.waiting_producers,
            waiting_consumers: state.waiting_consumers,
        }
    }
}

impl<T: Send + 'static> BoundedBlockingQueue<T> {
    /// Enqueue, blocking until space, `deadline`, or `token` is cancelled
    pub fn put_until(
        &self,
        item: T,
        deadline: impl Into<Deadline>,
        token: &CancellationToken,
    ) -> Result<(), PutError<T>> {
        let deadline = deadline.into();
        let _registration = token.register(self.waker());

        let result = self.enqueue(item, &deadline, || token.is_cancelled());
        if matches!(result, Err(PutError::Cancelled(_))) {
            trace!("Blocked put cancelled");
        }
        result
    }

    /// Dequeue, blocking until an item, `deadline`, or `token` is cancelled
    pub fn take_until(&self, deadline: impl Into<Deadline>, token: &CancellationToken) -> WaitResult<T> {
        let deadline = deadline.into();
        let _registration = token.register(self.waker());

        let result = self.dequeue(&deadline, || token.is_cancelled());
        if matches!(result, Err(WaitError::Cancelled)) {
            trace!("Blocked take cancelled");
        }
        result
    }

    fn waker(&self) -> Arc<dyn Wake> {
        Arc::clone(&self.shared) as Arc<dyn Wake>
    }
}

impl<T> std::fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BoundedBlockingQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.shared.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
