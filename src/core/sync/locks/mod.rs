/*!
 * Lock-Based Synchronization Primitives
 *
 * Striped locks reduce contention by partitioning one logical lock space
 * across a fixed number of mutexes.
 */

mod striped;

// Re-export public API
pub use striped::{PairGuard, StripeLocks};
