/*!
 * Blocking Queue
 * Bounded MPMC hand-off with timeouts, cancellation and close
 */

mod blocking;
mod config;
mod types;

// Re-export public API
pub use blocking::BoundedBlockingQueue;
pub use config::QueueConfig;
pub use types::{PutError, QueueState, QueueStats, TrySendError};
