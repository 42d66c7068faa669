/*!
 * Priority Transfer Queue Integration Tests
 *
 * Handoff precedence, buffered priority order, transfer blocking, and
 * timeout fidelity under real producer/consumer threads.
 */

use pretty_assertions::assert_eq;
use priosync::PriorityTransferQueue;
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Event {
    source: &'static str,
    priority: i32,
}

fn event_queue() -> PriorityTransferQueue<Event> {
    PriorityTransferQueue::with_comparator(|a: &Event, b: &Event| a.priority.cmp(&b.priority))
}

#[test]
fn test_parked_consumer_receives_put_directly() {
    let queue = Arc::new(event_queue());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.take())
    };

    // Wait until the consumer is actually registered
    while !queue.has_waiting_consumer() {
        thread::yield_now();
    }

    // Low priority on purpose: the handoff path must ignore ranking
    queue.put(Event {
        source: "direct",
        priority: -100,
    });

    let received = consumer.join().unwrap();
    assert_eq!(received.source, "direct");

    // Nothing passed through the buffered store
    assert!(queue.is_empty());
}

#[test]
fn test_handoff_bypasses_buffered_priorities() {
    let queue = Arc::new(event_queue());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            // First take parks; it must get the handoff item even though
            // higher-priority elements get buffered afterwards.
            queue.take()
        })
    };

    while !queue.has_waiting_consumer() {
        thread::yield_now();
    }

    queue.put(Event {
        source: "handoff",
        priority: 1,
    });
    let first = consumer.join().unwrap();
    assert_eq!(first.source, "handoff");

    // With no consumer waiting, puts are buffered and ranked
    queue.put(Event {
        source: "low",
        priority: 1,
    });
    queue.put(Event {
        source: "high",
        priority: 10,
    });
    assert_eq!(queue.take().source, "high");
    assert_eq!(queue.take().source, "low");
}

#[test]
fn test_transfer_blocks_until_claimed() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());
    let claimed_at: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    let consumer = {
        let queue = queue.clone();
        let claimed_at = claimed_at.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            let item = queue.take();
            *claimed_at.lock().unwrap() = Some(Instant::now());
            item
        })
    };

    queue.transfer(77);
    let returned_at = Instant::now();

    assert_eq!(consumer.join().unwrap(), 77);
    let claimed_at = claimed_at.lock().unwrap().expect("claim must precede return");
    assert!(claimed_at <= returned_at);
}

#[test]
fn test_transfer_immediate_with_waiting_consumer() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.take())
    };

    while !queue.has_waiting_consumer() {
        thread::yield_now();
    }

    let start = Instant::now();
    queue.transfer(5);
    // Direct path: no registration, no park
    assert!(start.elapsed() < Duration::from_millis(500));

    assert_eq!(consumer.join().unwrap(), 5);
}

#[test]
fn test_try_transfer_pairs_with_parked_consumer() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    assert_eq!(queue.try_transfer(1), Err(1));

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.take())
    };

    while !queue.has_waiting_consumer() {
        thread::yield_now();
    }

    assert_eq!(queue.try_transfer(2), Ok(()));
    assert_eq!(consumer.join().unwrap(), 2);
}

#[test]
fn test_timed_transfer_item_never_deliverable_after_timeout() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    let start = Instant::now();
    assert_eq!(
        queue.try_transfer_for(9, Duration::from_millis(100)),
        Err(9)
    );
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(600));

    // A consumer arriving later must not see the withdrawn element
    assert_eq!(queue.poll(), None);
    assert_eq!(queue.poll_timeout(Duration::from_millis(50)), None);
}

#[test]
fn test_timed_transfer_succeeds_when_claimed() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            queue.take()
        })
    };

    assert_eq!(queue.try_transfer_for(3, Duration::from_secs(5)), Ok(()));
    assert_eq!(consumer.join().unwrap(), 3);
}

#[test]
fn test_take_prefers_pending_transfer_over_buffer() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    // Buffer a high-priority element first
    queue.put(1_000);

    let transfer_done = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = queue.clone();
        let transfer_done = transfer_done.clone();
        thread::spawn(move || {
            queue.transfer(7);
            transfer_done.store(true, Ordering::SeqCst);
        })
    };

    // Wait for the registration to land
    while queue.len() < 2 {
        thread::yield_now();
    }

    // The parked producer is serviced before the buffered maximum
    assert_eq!(queue.take(), 7);
    producer.join().unwrap();
    assert!(transfer_done.load(Ordering::SeqCst));

    assert_eq!(queue.take(), 1_000);
}

#[test]
fn test_each_element_claimed_exactly_once() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u32 = 250;

    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.put(p as u32 * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..(PRODUCERS as u32 * PER_PRODUCER / 2) {
                    seen.push(queue.take());
                }
                seen
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    let mut all: Vec<u32> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    all.sort_unstable();

    let expected: Vec<u32> = (0..PRODUCERS as u32 * PER_PRODUCER).collect();
    assert_eq!(all, expected, "every element claimed exactly once");
    assert!(queue.is_empty());
}

#[test]
fn test_poll_timeout_receives_late_put() {
    let queue: Arc<PriorityTransferQueue<u32>> = Arc::new(PriorityTransferQueue::new());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.poll_timeout(Duration::from_secs(5)))
    };

    while !queue.has_waiting_consumer() {
        thread::yield_now();
    }
    queue.put(88);

    assert_eq!(consumer.join().unwrap(), Some(88));
}

proptest! {
    /// Buffered-path contract: with no waiting consumers, repeated polls are
    /// non-increasing in priority for every adjacent pair.
    #[test]
    fn prop_buffered_polls_are_sorted(items in prop::collection::vec(any::<i32>(), 0..200)) {
        let queue = PriorityTransferQueue::new();
        for item in &items {
            queue.put(*item);
        }

        let mut drained = Vec::with_capacity(items.len());
        while let Some(item) = queue.poll() {
            drained.push(item);
        }

        prop_assert_eq!(drained.len(), items.len());
        for pair in drained.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }
}
