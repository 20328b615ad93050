/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors raised when constructing a map, queue, or pipeline
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid load factor: {0}")]
    #[diagnostic(
        code(config::invalid_load_factor),
        help("Load factor must be a finite number greater than zero (0.75 is the usual choice).")
    )]
    InvalidLoadFactor(f64),

    #[error("Invalid stripe count: {0}")]
    #[diagnostic(
        code(config::invalid_stripe_count),
        help("Stripe count must be a non-zero power of two, e.g. 16 or 64.")
    )]
    InvalidStripeCount(usize),

    #[error("Invalid migration stride: {0}")]
    #[diagnostic(
        code(config::invalid_migration_stride),
        help("Each helping writer must migrate at least one bucket.")
    )]
    InvalidMigrationStride(usize),

    #[error("Invalid queue capacity: {0}")]
    #[diagnostic(
        code(config::invalid_queue_capacity),
        help("A bounded queue needs room for at least one item. Use an unbounded queue otherwise.")
    )]
    InvalidQueueCapacity(usize),

    #[error("Invalid worker count: {0}")]
    #[diagnostic(
        code(config::invalid_worker_count),
        help("Worker count must be between 1 and the configured maximum.")
    )]
    InvalidWorkerCount(usize),

    #[error("Invalid environment value for {key}: {value}")]
    #[diagnostic(
        code(config::invalid_env),
        help("Check the variable is set to a plain unsigned integer.")
    )]
    InvalidEnv { key: String, value: String },
}

/// Map errors surfaced by explicit growth requests
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MapError {
    #[error("Failed to allocate table of {requested} buckets")]
    #[diagnostic(
        code(map::allocation_failed),
        help("The map keeps serving from its current table. Free memory or lower the load.")
    )]
    AllocationFailed { requested: usize },

    #[error("Table already at maximum capacity ({0} buckets)")]
    #[diagnostic(
        code(map::capacity_exhausted),
        help("The table cannot grow further; buckets will treeify under collision pressure instead.")
    )]
    CapacityExhausted(usize),

    #[error("Resize already in progress (generation {0})")]
    #[diagnostic(
        code(map::resize_in_progress),
        help("Call finish_resize() to drive the running migration to completion first.")
    )]
    ResizeInProgress(u64),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type MapResult<T> = Result<T, MapError>;
