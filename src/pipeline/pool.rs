/*!
 * Worker Pool
 *
 * Producers submit jobs into a bounded queue; worker threads take them and
 * memoize results in a striped map, so a job submitted twice is computed
 * once.
 */

use super::config::PipelineConfig;
use crate::collections::{BoundedBlockingQueue, PutError, StripedMap, TrySendError};
use crate::core::errors::ConfigError;
use ahash::RandomState;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pool start-up failure
#[derive(Error, Debug, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn worker thread: {0}")]
    #[diagnostic(
        code(pipeline::spawn_failed),
        help("The process may have hit its thread limit. Lower STRIPED_WORKERS.")
    )]
    Spawn(#[from] std::io::Error),
}

/// Totals reported when a pool shuts down
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Jobs whose result was computed by the handler
    pub processed: u64,
    /// Jobs answered from the results cache
    pub cache_hits: u64,
    /// Workers that ended in a panic
    pub failed_workers: usize,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    cache_hits: AtomicU64,
}

type Handler<J, R> = dyn Fn(&J) -> R + Send + Sync;

/// Fixed set of worker threads fed by a blocking queue
pub struct WorkerPool<J, R> {
    jobs: BoundedBlockingQueue<J>,
    results: Arc<StripedMap<J, R>>,
    counters: Arc<Counters>,
    workers: Vec<JoinHandle<()>>,
    config: PipelineConfig,
}

impl<J, R> WorkerPool<J, R>
where
    J: Hash + Eq + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Start `config.workers` threads running `handler` on submitted jobs
    pub fn spawn<F>(config: PipelineConfig, handler: F) -> Result<Self, PipelineError>
    where
        F: Fn(&J) -> R + Send + Sync + 'static,
    {
        config.validate()?;

        let jobs = BoundedBlockingQueue::with_config(config.queue_config())?;
        let results = Arc::new(StripedMap::with_config(config.map.clone(), RandomState::new())?);
        let counters = Arc::new(Counters::default());
        let handler: Arc<Handler<J, R>> = Arc::new(handler);

        let mut pool = Self {
            jobs,
            results,
            counters,
            workers: Vec::with_capacity(config.workers),
            config,
        };

        for id in 0..pool.config.workers {
            let jobs = pool.jobs.clone();
            let results = Arc::clone(&pool.results);
            let counters = Arc::clone(&pool.counters);
            let handler = Arc::clone(&handler);

            let handle = thread::Builder::new()
                .name(format!("striped-worker-{}", id))
                .spawn(move || run_worker(id, &jobs, &results, &counters, &*handler))?;
            pool.workers.push(handle);
        }

        info!(
            workers = pool.config.workers,
            queue_capacity = ?pool.config.queue_capacity,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Queue a job, waiting up to the configured submit timeout for space
    pub fn submit(&self, job: J) -> Result<(), PutError<J>> {
        self.jobs.put_timeout(job, self.config.submit_timeout)
    }

    /// Queue a job only if there is space right now
    pub fn try_submit(&self, job: J) -> Result<(), TrySendError<J>> {
        self.jobs.try_send(job)
    }

    /// Shared results cache
    pub fn results(&self) -> &Arc<StripedMap<J, R>> {
        &self.results
    }

    /// Jobs waiting to be picked up
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Close the queue, let workers finish what is queued, and join them
    pub fn shutdown(mut self) -> PipelineReport {
        let failed_workers = self.join_workers();
        let report = PipelineReport {
            processed: self.counters.processed.load(Ordering::Acquire),
            cache_hits: self.counters.cache_hits.load(Ordering::Acquire),
            failed_workers,
        };
        info!(
            processed = report.processed,
            cache_hits = report.cache_hits,
            failed_workers = report.failed_workers,
            "Worker pool stopped"
        );
        report
    }
}

fn run_worker<J, R>(
    id: usize,
    jobs: &BoundedBlockingQueue<J>,
    results: &StripedMap<J, R>,
    counters: &Counters,
    handler: &Handler<J, R>,
) where
    J: Hash + Eq + Clone,
    R: Clone,
{
    debug!(worker = id, "Worker started");

    // Only `Closed` ends a plain take
    while let Ok(job) = jobs.take() {
        let mut computed = false;
        results.compute_if_absent(job.clone(), || {
            computed = true;
            handler(&job)
        });

        if computed {
            counters.processed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    debug!(worker = id, "Worker drained");
}

impl<J, R> WorkerPool<J, R> {
    /// Close the queue and join every worker; returns how many panicked
    fn join_workers(&mut self) -> usize {
        self.jobs.close();

        let mut failed = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, "Workers exited by panic");
        }
        failed
    }
}

impl<J, R> Drop for WorkerPool<J, R> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.join_workers();
        }
    }
}
