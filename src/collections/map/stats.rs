/*!
 * Map Statistics
 */

use serde::{Deserialize, Serialize};

/// Point-in-time shape of a striped map
///
/// Gathered without a global barrier, so counts may be mutually inconsistent
/// under concurrent writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    /// Approximate entry count
    pub len: usize,
    /// Length of the current table
    pub table_len: usize,
    /// Stripe locks in the current table
    pub stripe_count: usize,
    /// Completed resizes since construction
    pub generation: u64,
    /// A resize is migrating buckets
    pub resizing: bool,
    /// Non-empty chain buckets
    pub chain_buckets: usize,
    /// Tree buckets
    pub tree_buckets: usize,
    /// Empty slots
    pub empty_buckets: usize,
    /// Slots already forwarded to the next table
    pub moved_buckets: usize,
    /// Largest entry count in any single bucket
    pub longest_bucket: usize,
}
