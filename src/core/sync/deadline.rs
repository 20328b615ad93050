/*!
 * Deadlines
 *
 * Monotonic deadlines for blocking operations. A deadline is fixed once, when
 * the operation starts, so spurious wakeups and retries never extend it.
 */

use std::time::{Duration, Instant};

/// Point in monotonic time after which a blocking operation gives up
///
/// `Deadline::never()` waits indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline (infinite wait)
    pub const fn never() -> Self {
        Self { at: None }
    }

    /// Deadline at a fixed instant
    pub const fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Deadline `timeout` from now
    ///
    /// A timeout too large to represent is treated as no deadline.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// Build from an optional timeout
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::never, Self::after)
    }

    /// The instant this deadline expires, if any
    #[inline]
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Check if this deadline has passed
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Remaining time before expiry (`None` for no deadline)
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl From<Option<Instant>> for Deadline {
    fn from(at: Option<Instant>) -> Self {
        Self { at }
    }
}

impl From<Instant> for Deadline {
    fn from(at: Instant) -> Self {
        Self::at(at)
    }
}

impl From<Duration> for Deadline {
    fn from(timeout: Duration) -> Self {
        Self::after(timeout)
    }
}
