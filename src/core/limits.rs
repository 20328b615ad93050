/*!
 * Limits and Constants
 *
 * Centralized thresholds and defaults for the striped map and blocking queue.
 * Performance-critical constants are marked with [PERF].
 */

use std::time::Duration;

// =============================================================================
// MAP TABLE SIZING
// =============================================================================

/// Largest table length (2^30)
/// Hashes are folded to 32 bits, so indices beyond this would lose bits
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Default initial table length
pub const DEFAULT_CAPACITY: usize = 16;

/// Ratio of entries to table length above which the table doubles
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Default number of lock stripes per table
/// [PERF] 16-64 balances memory against write contention
pub const DEFAULT_STRIPE_COUNT: usize = 16;

/// Buckets migrated per helping call during a resize
/// [PERF] Bounds the extra latency any single writer pays while a resize runs
pub const DEFAULT_MIGRATION_STRIDE: usize = 16;

// =============================================================================
// BUCKET SHAPE
// =============================================================================

/// Entry count at which a chain bucket becomes a tree
pub const TREEIFY_THRESHOLD: usize = 8;

/// Entry count at or below which a tree bucket reverts to a chain
/// Kept below TREEIFY_THRESHOLD so a bucket hovering at the boundary does not flip every operation
pub const UNTREEIFY_THRESHOLD: usize = 6;

/// Smallest table length at which buckets may be treeified
/// Smaller tables resize instead, since collisions there are usually just crowding
pub const MIN_TREEIFY_CAPACITY: usize = 64;

// =============================================================================
// QUEUE
// =============================================================================

/// Default capacity for bounded pipeline queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default wait applied by pipeline producers before reporting backpressure
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// PIPELINE
// =============================================================================

/// Default worker thread count for the pipeline
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on pipeline workers
pub const MAX_WORKERS: usize = 256;
