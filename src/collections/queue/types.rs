/*!
 * Queue Types
 * Outcomes and observations for the blocking queue
 */

use crate::core::sync::WaitError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A put that did not enqueue; the item is handed back
#[derive(Clone, PartialEq, Eq)]
pub enum PutError<T> {
    /// The deadline passed while the queue stayed full
    Timeout(T),
    /// The cancellation token fired first
    Cancelled(T),
    /// The queue was closed
    Closed(T),
}

impl<T> PutError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            PutError::Timeout(item) | PutError::Cancelled(item) | PutError::Closed(item) => item,
        }
    }

    /// Reason without the item
    pub fn reason(&self) -> WaitError {
        match self {
            PutError::Timeout(_) => WaitError::Timeout,
            PutError::Cancelled(_) => WaitError::Cancelled,
            PutError::Closed(_) => WaitError::Closed,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PutError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PutError::Cancelled(_))
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Timeout(_) => f.write_str("Timeout(..)"),
            PutError::Cancelled(_) => f.write_str("Cancelled(..)"),
            PutError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Timeout(_) => f.write_str("put timed out on a full queue"),
            PutError::Cancelled(_) => f.write_str("put was cancelled"),
            PutError::Closed(_) => f.write_str("put on a closed queue"),
        }
    }
}

impl<T> std::error::Error for PutError<T> {}

/// A non-blocking send that did not enqueue
#[derive(Clone, PartialEq, Eq)]
pub enum TrySendError<T> {
    Full(T),
    Closed(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("sending on a full queue"),
            TrySendError::Closed(_) => f.write_str("sending on a closed queue"),
        }
    }
}

impl<T> std::error::Error for TrySendError<T> {}

/// Fill level of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Empty,
    Partial,
    Full,
}

/// Queue counters since construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub len: usize,
    /// `None` for an unbounded queue
    pub capacity: Option<usize>,
    pub closed: bool,
    pub total_put: u64,
    pub total_taken: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    /// Producers currently parked on a full queue
    pub waiting_producers: usize,
    /// Consumers currently parked on an empty queue
    pub waiting_consumers: usize,
}
