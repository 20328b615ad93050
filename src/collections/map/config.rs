/*!
 * Map Configuration
 *
 * Construction parameters for `StripedMap`
 */

use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::{
    DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, DEFAULT_MIGRATION_STRIDE, DEFAULT_STRIPE_COUNT,
    MAXIMUM_CAPACITY,
};
use serde::{Deserialize, Serialize};

/// Striped map configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial table length, rounded up to a power of two
    pub initial_capacity: usize,
    /// Entries per slot above which the table doubles
    pub load_factor: f64,
    /// Lock stripes per table (power of two)
    pub stripe_count: usize,
    /// Buckets each writer migrates while a resize is in progress
    pub migration_stride: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            stripe_count: DEFAULT_STRIPE_COUNT,
            migration_stride: DEFAULT_MIGRATION_STRIDE,
        }
    }
}

impl MapConfig {
    /// Configuration with a starting capacity
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Many writer threads: more stripes, smaller migration steps
    pub const fn high_concurrency() -> Self {
        Self {
            initial_capacity: 256,
            load_factor: DEFAULT_LOAD_FACTOR,
            stripe_count: 64,
            migration_stride: 8,
        }
    }

    /// Few writers, memory-sensitive
    pub const fn compact() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: 1.0,
            stripe_count: 4,
            migration_stride: 32,
        }
    }

    /// Check every field
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if self.stripe_count == 0 || !self.stripe_count.is_power_of_two() {
            return Err(ConfigError::InvalidStripeCount(self.stripe_count));
        }
        if self.migration_stride == 0 {
            return Err(ConfigError::InvalidMigrationStride(self.migration_stride));
        }
        Ok(())
    }

    /// Initial table length, clamped to `MAXIMUM_CAPACITY`
    pub fn table_len(&self) -> usize {
        if self.initial_capacity >= MAXIMUM_CAPACITY {
            return MAXIMUM_CAPACITY;
        }
        self.initial_capacity.max(1).next_power_of_two()
    }
}
