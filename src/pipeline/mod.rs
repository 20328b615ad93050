/*!
 * Pipeline
 * Worker pool wiring the blocking queue to a memoizing striped map
 */

mod config;
mod pool;

// Re-export public API
pub use config::{env_usize, PipelineConfig};
pub use pool::{PipelineError, PipelineReport, WorkerPool};
