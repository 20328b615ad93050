/*!
 * Cancellation
 *
 * A cancellation token wakes threads blocked on a condition variable and
 * makes them report `Cancelled` instead of `Timeout`.
 *
 * # Protocol
 *
 * A blocking operation registers a waker before taking its own lock, then
 * checks `is_cancelled()` under that lock before every wait. `cancel()` sets
 * the flag first and only then runs the wakers, and each waker takes the same
 * lock before notifying. Either the waiter sees the flag, or it is already
 * parked when the notification arrives.
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Something a cancellation can wake
pub trait Wake: Send + Sync {
    /// Wake every thread blocked on this object
    fn wake(&self);
}

struct TokenInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    wakers: Mutex<Vec<(u64, Arc<dyn Wake>)>>,
}

/// Cloneable, shareable cancellation signal
///
/// # Example
///
/// ```
/// use striped_sync::core::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let child = token.clone();
/// token.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create an uncancelled token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancel, waking every registered waiter
    ///
    /// Idempotent; only the first call runs the wakers.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let wakers = std::mem::take(&mut *self.inner.wakers.lock());
        trace!(wakers = wakers.len(), "Cancellation token fired");
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    /// Check whether `cancel()` has been called
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a waker for the lifetime of the returned registration
    pub fn register(&self, waker: Arc<dyn Wake>) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, waker));
        Registration { token: self, id }
    }

    /// Number of currently registered wakers
    pub fn waiter_count(&self) -> usize {
        self.inner.wakers.lock().len()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a waker registered; unregisters on drop
pub struct Registration<'a> {
    token: &'a CancellationToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.token.inner.wakers.lock().retain(|(other, _)| *other != id);
    }
}
