/*!
 * Worker Pool Tests
 * Backpressure and memoization through the queue-to-map pipeline
 */

use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use striped_sync::{MapConfig, PipelineConfig, PutError, TrySendError, WorkerPool};

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_submit_times_out_under_backpressure() {
    let release = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&release);

    let config = PipelineConfig {
        workers: 1,
        queue_capacity: Some(1),
        submit_timeout: Duration::from_millis(30),
        ..PipelineConfig::default()
    };
    let pool = WorkerPool::spawn(config, move |n: &u32| {
        while !gate.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
        n + 100
    })
    .unwrap();

    pool.submit(1).unwrap();
    wait_for(|| pool.pending() == 0);

    pool.submit(2).unwrap();
    assert!(matches!(pool.try_submit(3), Err(TrySendError::Full(3))));
    match pool.submit(3) {
        Err(PutError::Timeout(job)) => assert_eq!(job, 3),
        other => panic!("expected timeout, got {:?}", other),
    }

    release.store(true, Ordering::Release);
    let results = Arc::clone(pool.results());
    let report = pool.shutdown();

    assert_eq!(report.processed, 2);
    assert_eq!(results.get(&1), Some(101));
    assert_eq!(results.get(&2), Some(102));
    assert_eq!(results.get(&3), None);
}

#[test]
fn test_repeated_jobs_hit_cache() {
    let config = PipelineConfig {
        workers: 4,
        queue_capacity: Some(8),
        map: MapConfig::high_concurrency(),
        ..PipelineConfig::default()
    };
    let pool = WorkerPool::spawn(config, |s: &String| s.len()).unwrap();

    let words = ["alpha", "beta", "gamma", "delta"];
    for round in 0..50 {
        for word in words {
            pool.submit(format!("{}-{}", word, round % 5)).unwrap();
        }
    }

    let results = Arc::clone(pool.results());
    let report = pool.shutdown();

    assert_eq!(report.processed, 20);
    assert_eq!(report.cache_hits, 180);
    assert_eq!(results.len(), 20);
    assert_eq!(results.get("gamma-3"), Some(7));
}

#[test]
fn test_dropped_pool_joins_workers() {
    let results = {
        let pool = WorkerPool::spawn(PipelineConfig::default(), |n: &u64| n * 2).unwrap();
        for n in 0..100 {
            pool.submit(n).unwrap();
        }
        Arc::clone(pool.results())
    };

    assert_eq!(results.len(), 100);
    assert_eq!(results.get(&99), Some(198));
}
