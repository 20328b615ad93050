/*!
 * Pipeline Configuration
 */

use crate::collections::{MapConfig, QueueConfig};
use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SUBMIT_TIMEOUT, DEFAULT_WORKERS, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads draining the job queue
    pub workers: usize,
    /// Job queue bound; `None` never applies backpressure
    pub queue_capacity: Option<usize>,
    /// How long `submit` waits on a full queue
    pub submit_timeout: Duration,
    /// Results cache configuration
    pub map: MapConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            map: MapConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the environment
    ///
    /// - `STRIPED_WORKERS`: worker thread count
    /// - `STRIPED_QUEUE_CAPACITY`: queue bound, or `unbounded`
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(workers) = env_usize("STRIPED_WORKERS")? {
            config.workers = workers;
        }
        match std::env::var("STRIPED_QUEUE_CAPACITY") {
            Ok(value) if value.eq_ignore_ascii_case("unbounded") => config.queue_capacity = None,
            Ok(value) => config.queue_capacity = Some(parse_usize("STRIPED_QUEUE_CAPACITY", &value)?),
            Err(_) => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount(self.workers));
        }
        self.queue_config().validate()?;
        self.map.validate()
    }
}

/// Read an optional unsigned integer from the environment
pub fn env_usize(key: &str) -> ConfigResult<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => parse_usize(key, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_usize(key: &str, value: &str) -> ConfigResult<usize> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
