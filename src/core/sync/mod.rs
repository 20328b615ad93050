/*!
 * Synchronization Primitives
 *
 * Building blocks shared by the striped map and the blocking queue:
 * - Striped locks for partitioned write access
 * - Monotonic deadlines for timeout-based waits
 * - Cancellation tokens that wake blocked threads
 * - Condvar parking with loop-rechecked conditions
 */

mod cancel;
mod deadline;
mod locks;
mod wait;

// Re-export public API
pub use cancel::{CancellationToken, Registration, Wake};
pub use deadline::Deadline;
pub use locks::{PairGuard, StripeLocks};
pub use wait::{park, WaitError, WaitResult};
