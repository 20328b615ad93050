/*!
 * Striped Pipeline - Demo Entry Point
 *
 * Feeds a stream of jobs with repeats through a worker pool and prints the
 * pool report, queue stats and results-map shape as JSON.
 *
 * Environment:
 * - STRIPED_WORKERS, STRIPED_QUEUE_CAPACITY: pool configuration
 * - STRIPED_JOBS: number of jobs to submit (default 100000)
 */

use anyhow::{Context, Result};
use striped_sync::monitoring::span_phase;
use striped_sync::pipeline::env_usize;
use striped_sync::{init_tracing, PipelineConfig, WorkerPool};
use tracing::{info, warn};

const DEFAULT_JOBS: usize = 100_000;

/// Distinct inputs in the job stream; everything past this is a repeat
const DISTINCT_JOBS: u64 = 4_096;

fn collatz_steps(mut n: u64) -> u32 {
    let mut steps = 0;
    while n > 1 {
        n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
        steps += 1;
    }
    steps
}

fn main() -> Result<()> {
    init_tracing();

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let jobs = env_usize("STRIPED_JOBS")
        .context("Invalid STRIPED_JOBS")?
        .unwrap_or(DEFAULT_JOBS);

    info!(jobs, workers = config.workers, "Starting pipeline");
    let pool = WorkerPool::spawn(config, |n: &u64| collatz_steps(*n))
        .context("Failed to start worker pool")?;
    let results = pool.results().clone();

    {
        let phase = span_phase("submit");
        let _entered = phase.enter();
        let mut rejected = 0usize;
        for i in 0..jobs as u64 {
            if let Err(err) = pool.submit(1 + i % DISTINCT_JOBS) {
                warn!(reason = %err, "Job rejected");
                rejected += 1;
            }
        }
        phase.record_items(jobs - rejected);
    }

    let report = {
        let phase = span_phase("drain");
        let _entered = phase.enter();
        pool.shutdown()
    };

    let longest = results
        .snapshot()
        .into_iter()
        .max_by_key(|(_, steps)| *steps);
    if let Some((n, steps)) = longest {
        info!(n, steps, "Longest chain");
    }

    let summary = serde_json::json!({
        "report": report,
        "map": results.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
