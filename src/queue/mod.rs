/*!
 * Priority Transfer Queue
 *
 * Unbounded producer/consumer queue ordered by a caller-supplied comparator,
 * with direct handoff to already-waiting consumers.
 *
 * # Design
 *
 * Two storage locations coexist:
 *
 * - a binary heap of buffered elements, served greatest-first per the
 *   comparator, and
 * - a FIFO of pending handoffs, which consumers always drain before
 *   touching the heap.
 *
 * A handoff delivered to a parked consumer never enters the heap, so it is
 * served regardless of buffered priorities. That trade (handoff latency
 * over strict global order) is deliberate; only the buffered path promises
 * priority order.
 *
 * All decisions (handoff vs buffer vs block) happen under one internal
 * mutex, and blocking uses two condvars tied to it: `not_empty` for
 * consumers and `transfer_done` for producers parked in `transfer`. The
 * waiting-consumer count is read and written under that same mutex, which
 * closes the race where a producer buffers an element concurrently with a
 * consumer registering to wait.
 */

mod entry;

use entry::{Comparator, HandoffEntry, HeapEntry};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Unbounded priority queue with direct producer-to-consumer handoff
///
/// # Examples
///
/// ```
/// use priosync::PriorityTransferQueue;
///
/// let queue = PriorityTransferQueue::new();
/// queue.put(2);
/// queue.put(9);
/// queue.put(4);
///
/// // Buffered elements come out greatest-first
/// assert_eq!(queue.poll(), Some(9));
/// assert_eq!(queue.poll(), Some(4));
/// assert_eq!(queue.poll(), Some(2));
/// assert_eq!(queue.poll(), None);
/// ```
pub struct PriorityTransferQueue<T> {
    inner: Mutex<Shared<T>>,
    /// Signalled when an element becomes claimable
    not_empty: Condvar,
    /// Signalled when a ticketed handoff is claimed or withdrawn
    transfer_done: Condvar,
    order: Arc<Comparator<T>>,
}

struct Shared<T> {
    heap: BinaryHeap<HeapEntry<T>>,
    handoff: VecDeque<HandoffEntry<T>>,
    /// Consumers currently blocked in `take`/`poll_timeout`
    waiting_consumers: usize,
    next_seq: u64,
    next_ticket: u64,
}

impl<T> Shared<T> {
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn bump_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn ticket_pending(&self, ticket: u64) -> bool {
        self.handoff.iter().any(|e| e.ticket == Some(ticket))
    }

    fn withdraw_ticket(&mut self, ticket: u64) -> Option<T> {
        let pos = self.handoff.iter().position(|e| e.ticket == Some(ticket))?;
        self.handoff.remove(pos).map(|e| e.item)
    }
}

impl<T: Ord + 'static> PriorityTransferQueue<T> {
    /// Create a queue using the element type's natural order
    pub fn new() -> Self {
        Self::with_comparator(T::cmp)
    }
}

impl<T> PriorityTransferQueue<T> {
    /// Create a queue ordered by a caller-supplied total-order comparator
    ///
    /// The greatest element per the comparator is served first. Ties break
    /// toward the earlier insertion.
    pub fn with_comparator<F>(order: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Shared {
                heap: BinaryHeap::new(),
                handoff: VecDeque::new(),
                waiting_consumers: 0,
                next_seq: 0,
                next_ticket: 0,
            }),
            not_empty: Condvar::new(),
            transfer_done: Condvar::new(),
            order: Arc::new(order),
        }
    }

    /// Insert an element; never blocks
    ///
    /// If a consumer is waiting, the element is handed to it directly and
    /// never enters the priority store; otherwise it is buffered in
    /// comparator order.
    pub fn put(&self, item: T) {
        let mut shared = self.inner.lock();
        if shared.waiting_consumers > 0 {
            shared.handoff.push_back(HandoffEntry { item, ticket: None });
            self.not_empty.notify_one();
        } else {
            let seq = shared.bump_seq();
            let order = self.order.clone();
            shared.heap.push(HeapEntry { item, seq, order });
        }
    }

    /// Hand the element to a waiting consumer, or give it back
    ///
    /// Returns `Err(item)` immediately if no consumer is waiting; the item
    /// is not stored anywhere in that case.
    pub fn try_transfer(&self, item: T) -> Result<(), T> {
        let mut shared = self.inner.lock();
        if shared.waiting_consumers == 0 {
            return Err(item);
        }
        shared.handoff.push_back(HandoffEntry { item, ticket: None });
        self.not_empty.notify_one();
        Ok(())
    }

    /// Hand the element to a consumer, blocking until it is claimed
    ///
    /// If a consumer is already waiting the handoff is immediate. Otherwise
    /// the element is registered for handoff and the producer parks until
    /// the claiming consumer wakes it. Returns only after the element has
    /// left the queue.
    pub fn transfer(&self, item: T) {
        let mut shared = self.inner.lock();
        if shared.waiting_consumers > 0 {
            shared.handoff.push_back(HandoffEntry { item, ticket: None });
            self.not_empty.notify_one();
            return;
        }

        let ticket = shared.bump_ticket();
        shared.handoff.push_back(HandoffEntry {
            item,
            ticket: Some(ticket),
        });
        trace!(ticket, "producer parked awaiting claim");

        // Loop until the entry is gone: wakeups prove nothing by themselves.
        while shared.ticket_pending(ticket) {
            self.transfer_done.wait(&mut shared);
        }
    }

    /// `transfer` with a deadline
    ///
    /// Returns `Err(item)` if no consumer claimed the element within
    /// `timeout`; the registration is withdrawn, so the element can never be
    /// delivered afterwards. A claim racing the deadline wins: the call then
    /// reports `Ok(())`.
    pub fn try_transfer_for(&self, item: T, timeout: Duration) -> Result<(), T> {
        let mut shared = self.inner.lock();
        if shared.waiting_consumers > 0 {
            shared.handoff.push_back(HandoffEntry { item, ticket: None });
            self.not_empty.notify_one();
            return Ok(());
        }

        let ticket = shared.bump_ticket();
        shared.handoff.push_back(HandoffEntry {
            item,
            ticket: Some(ticket),
        });
        let deadline = Instant::now() + timeout;

        while shared.ticket_pending(ticket) {
            if self
                .transfer_done
                .wait_until(&mut shared, deadline)
                .timed_out()
            {
                return match shared.withdraw_ticket(ticket) {
                    Some(item) => {
                        trace!(ticket, "transfer timed out, registration withdrawn");
                        Err(item)
                    }
                    // Claimed between the deadline firing and us re-taking
                    // the mutex; the handoff happened.
                    None => Ok(()),
                };
            }
        }
        Ok(())
    }

    /// Remove and return the next element, blocking while none is available
    ///
    /// Pending handoffs are served before the priority store, so a parked
    /// producer is released before buffered elements are reordered past it.
    pub fn take(&self) -> T {
        let mut shared = self.inner.lock();
        loop {
            if let Some(item) = self.claim_ready(&mut shared) {
                return item;
            }
            shared.waiting_consumers += 1;
            self.not_empty.wait(&mut shared);
            shared.waiting_consumers -= 1;
        }
    }

    /// Non-blocking claim: pending handoff first, then the heap maximum
    pub fn poll(&self) -> Option<T> {
        let mut shared = self.inner.lock();
        self.claim_ready(&mut shared)
    }

    /// `take` with a deadline; `None` if nothing arrived in time
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.inner.lock();
        loop {
            if let Some(item) = self.claim_ready(&mut shared) {
                return Some(item);
            }
            shared.waiting_consumers += 1;
            let timed_out = self
                .not_empty
                .wait_until(&mut shared, deadline)
                .timed_out();
            shared.waiting_consumers -= 1;
            if timed_out {
                // One last look; an element may have landed with the timeout.
                return self.claim_ready(&mut shared);
            }
        }
    }

    /// Whether any consumer is blocked waiting (advisory, racy)
    pub fn has_waiting_consumer(&self) -> bool {
        self.inner.lock().waiting_consumers > 0
    }

    /// Number of consumers blocked waiting (advisory, racy)
    pub fn waiting_consumer_count(&self) -> usize {
        self.inner.lock().waiting_consumers
    }

    /// Buffered elements plus unclaimed handoffs (advisory, racy)
    pub fn len(&self) -> usize {
        let shared = self.inner.lock();
        shared.heap.len() + shared.handoff.len()
    }

    /// Whether nothing is currently claimable (advisory, racy)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop the next claimable element under the mutex, waking the producer
    /// of a ticketed handoff
    fn claim_ready(&self, shared: &mut Shared<T>) -> Option<T> {
        if let Some(entry) = shared.handoff.pop_front() {
            if entry.ticket.is_some() {
                // Parked producers re-check their own ticket, so wake all.
                self.transfer_done.notify_all();
            }
            return Some(entry.item);
        }
        shared.heap.pop().map(|e| e.item)
    }
}

impl<T: Ord + 'static> Default for PriorityTransferQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PriorityTransferQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("PriorityTransferQueue")
            .field("buffered", &shared.heap.len())
            .field("pending_handoffs", &shared.handoff.len())
            .field("waiting_consumers", &shared.waiting_consumers)
            .finish()
    }
}
