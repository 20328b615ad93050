/*!
 * Condition Waits
 *
 * Outcome types and the parking helper shared by every blocking operation.
 * Callers always re-check their condition in a loop around `park`; a return
 * from `park` only means "look again".
 */

use super::deadline::Deadline;
use parking_lot::{Condvar, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for wait operations
pub type WaitResult<T> = Result<T, WaitError>;

/// Why a blocking operation returned without completing
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitError {
    #[error("Wait operation timed out")]
    Timeout,

    #[error("Wait was cancelled")]
    Cancelled,

    #[error("Queue is closed")]
    Closed,
}

/// Park on `condvar` until notified or `deadline` passes
///
/// Atomically releases the lock behind `guard` while parked and reacquires
/// it before returning.
#[inline]
pub fn park<T>(condvar: &Condvar, guard: &mut MutexGuard<'_, T>, deadline: &Deadline) {
    match deadline.instant() {
        None => condvar.wait(guard),
        Some(at) => {
            // Timeouts are detected by the caller's deadline check
            let _ = condvar.wait_until(guard, at);
        }
    }
}
