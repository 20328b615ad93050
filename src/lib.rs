/*!
 * Striped Sync Library
 * Concurrent collections built on lock striping
 *
 * - `StripedMap`: hash map with lock-free reads, striped writes and
 *   cooperative incremental resizing
 * - `BoundedBlockingQueue`: FIFO hand-off with timeouts and cancellation
 * - `WorkerPool`: queue-fed workers memoizing into a striped map
 */

pub mod collections;
pub mod core;
pub mod monitoring;
pub mod pipeline;

// Re-exports
pub use collections::{
    BoundedBlockingQueue, MapConfig, MapStats, PutError, QueueConfig, QueueState, QueueStats,
    StripedMap, TrySendError,
};
pub use crate::core::errors::*;
pub use crate::core::sync::{CancellationToken, Deadline, WaitError, WaitResult};
pub use monitoring::init_tracing;
pub use pipeline::{PipelineConfig, PipelineError, PipelineReport, WorkerPool};
