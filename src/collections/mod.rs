/*!
 * Concurrent Collections
 */

pub mod map;
pub mod queue;

pub use map::{MapConfig, MapStats, StripedMap};
pub use queue::{BoundedBlockingQueue, PutError, QueueConfig, QueueState, QueueStats, TrySendError};
