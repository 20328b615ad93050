/*!
 * Blocking Queue Tests
 * Hand-off ordering, backpressure, timeouts, cancellation and close
 */

use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use striped_sync::{BoundedBlockingQueue, CancellationToken, Deadline, PutError, QueueState, WaitError};

#[test]
fn test_full_queue_blocks_producer_until_take() {
    // A fills a capacity-2 queue, B blocks on the third put, C's take lets B in
    let queue = BoundedBlockingQueue::bounded(2).unwrap();
    queue.put("a1").unwrap();
    queue.put("a2").unwrap();
    assert_eq!(queue.state(), QueueState::Full);

    let (done_tx, done_rx) = mpsc::channel();
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let result = queue.put("b1");
            done_tx.send(()).unwrap();
            result
        })
    };

    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err(), "put should block");
    assert_eq!(queue.stats().waiting_producers, 1);

    assert_eq!(queue.take(), Ok("a1"));
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    producer.join().unwrap().unwrap();

    assert_eq!(queue.take(), Ok("a2"));
    assert_eq!(queue.take(), Ok("b1"));
}

#[test]
fn test_timed_out_put_succeeds_on_retry_after_take() {
    let queue = BoundedBlockingQueue::bounded(2).unwrap();
    queue.put("A").unwrap();
    queue.put("B").unwrap();

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || match queue.put_timeout("C", Duration::from_millis(50)) {
            Err(PutError::Timeout(item)) => item,
            other => panic!("expected timeout, got {:?}", other),
        })
    };
    let returned = producer.join().unwrap();
    assert_eq!(returned, "C");
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.take(), Ok("A"));
    queue.put_timeout(returned, Duration::from_millis(50)).unwrap();

    assert_eq!(queue.take(), Ok("B"));
    assert_eq!(queue.take(), Ok("C"));
    assert!(queue.is_empty());
}

#[test]
fn test_take_timeout_returns_after_deadline() {
    let queue: BoundedBlockingQueue<u32> = BoundedBlockingQueue::bounded(1).unwrap();
    let start = Instant::now();

    assert_eq!(queue.take_timeout(Duration::from_millis(100)), Err(WaitError::Timeout));

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn test_mpmc_delivers_each_item_once_in_producer_order() {
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: u64 = 2_000;

    let queue = BoundedBlockingQueue::bounded(16).unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    queue.put((p, seq)).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Ok(item) = queue.take() {
                    received.push(item);
                }
                received
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    queue.close();

    let mut all = Vec::new();
    for consumer in consumers {
        let received = consumer.join().unwrap();
        // Each consumer sees any single producer's items in send order
        for p in 0..PRODUCERS {
            let seqs: Vec<u64> = received.iter().filter(|(q, _)| *q == p).map(|(_, s)| *s).collect();
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        }
        all.extend(received);
    }

    all.sort_unstable();
    let expected: Vec<(u64, u64)> = (0..PRODUCERS)
        .flat_map(|p| (0..PER_PRODUCER).map(move |s| (p, s)))
        .collect();
    assert_eq!(all.len(), expected.len());
    assert!(all == expected);

    let stats = queue.stats();
    assert_eq!(stats.total_put, PRODUCERS * PER_PRODUCER);
    assert_eq!(stats.total_taken, PRODUCERS * PER_PRODUCER);
}

#[test]
fn test_cancel_and_timeout_are_distinct() {
    let queue = BoundedBlockingQueue::bounded(1).unwrap();
    queue.put(0u32).unwrap();

    let token = CancellationToken::new();
    let cancelled = {
        let queue = queue.clone();
        let token = token.clone();
        thread::spawn(move || queue.put_until(1, Deadline::after(Duration::from_secs(30)), &token))
    };
    let timed_out = {
        let queue = queue.clone();
        let token = CancellationToken::new();
        thread::spawn(move || queue.put_until(2, Deadline::after(Duration::from_millis(80)), &token))
    };

    thread::sleep(Duration::from_millis(150));
    let start = Instant::now();
    token.cancel();

    match cancelled.join().unwrap() {
        Err(PutError::Cancelled(item)) => assert_eq!(item, 1),
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(start.elapsed() < Duration::from_secs(5));

    match timed_out.join().unwrap() {
        Err(PutError::Timeout(item)) => assert_eq!(item, 2),
        other => panic!("expected timeout, got {:?}", other),
    }

    let stats = queue.stats();
    assert_eq!(stats.cancellations, 1);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_cancel_only_wakes_its_own_waiter() {
    let queue: BoundedBlockingQueue<u32> = BoundedBlockingQueue::bounded(4).unwrap();
    let doomed = CancellationToken::new();
    let survivor = CancellationToken::new();

    let cancelled = {
        let queue = queue.clone();
        let token = doomed.clone();
        thread::spawn(move || queue.take_until(Deadline::never(), &token))
    };
    let waiting = {
        let queue = queue.clone();
        let token = survivor.clone();
        thread::spawn(move || queue.take_until(Deadline::after(Duration::from_secs(30)), &token))
    };

    thread::sleep(Duration::from_millis(50));
    doomed.cancel();
    assert_eq!(cancelled.join().unwrap(), Err(WaitError::Cancelled));

    thread::sleep(Duration::from_millis(50));
    queue.put(42).unwrap();
    assert_eq!(waiting.join().unwrap(), Ok(42));
    assert!(!survivor.is_cancelled());
}

#[test]
fn test_already_cancelled_token_does_not_block() {
    let queue: BoundedBlockingQueue<u8> = BoundedBlockingQueue::bounded(1).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    assert_eq!(queue.take_until(Deadline::never(), &token), Err(WaitError::Cancelled));
}

#[test]
fn test_close_fails_blocked_producers_with_their_item() {
    let queue = Arc::new(BoundedBlockingQueue::bounded(1).unwrap());
    queue.put(String::from("kept")).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(String::from("rejected")))
    };

    thread::sleep(Duration::from_millis(50));
    queue.close();

    match producer.join().unwrap() {
        Err(PutError::Closed(item)) => assert_eq!(item, "rejected"),
        other => panic!("expected closed, got {:?}", other),
    }
    assert_eq!(queue.take().as_deref(), Ok("kept"));
    assert_eq!(queue.take(), Err(WaitError::Closed));
}

#[test]
fn test_drain_frees_space_for_blocked_producers() {
    let queue = BoundedBlockingQueue::bounded(2).unwrap();
    queue.put(1).unwrap();
    queue.put(2).unwrap();

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || queue.put_timeout(3, Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(queue.drain(), vec![1, 2]);
    producer.join().unwrap().unwrap();
    assert_eq!(queue.try_receive(), Some(3));
}

#[test]
fn test_single_producer_order_preserved() {
    let queue = BoundedBlockingQueue::bounded(8).unwrap();

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for n in 1..=1000u32 {
                queue.put(n).unwrap();
            }
        })
    };

    let received: Vec<u32> = (0..1000).map(|_| queue.take().unwrap()).collect();
    producer.join().unwrap();

    assert_eq!(received, (1..=1000).collect::<Vec<_>>());
    assert!(queue.is_empty());
}
