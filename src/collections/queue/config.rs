/*!
 * Queue Configuration
 */

use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};

/// Blocking queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued items; `None` never blocks producers
    pub capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::bounded(DEFAULT_QUEUE_CAPACITY)
    }
}

impl QueueConfig {
    pub const fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
        }
    }

    pub const fn unbounded() -> Self {
        Self { capacity: None }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match self.capacity {
            Some(0) => Err(ConfigError::InvalidQueueCapacity(0)),
            _ => Ok(()),
        }
    }
}
