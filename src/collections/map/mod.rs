/*!
 * Striped Map
 *
 * Concurrent hash map with striped write locks, lock-free reads, incremental
 * cooperative resizing, and balanced-tree buckets for heavy collisions.
 */

mod bucket;
mod config;
#[allow(clippy::module_inception)]
mod map;
mod reentrancy;
mod resize;
mod stats;
mod table;
mod tree;

// Re-export public API
pub use config::MapConfig;
pub use map::StripedMap;
pub use stats::MapStats;
