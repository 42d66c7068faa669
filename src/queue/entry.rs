/*!
 * Queue Entry Types
 *
 * Wrappers that give buffered elements a comparator-driven heap order and
 * pending handoffs their claim tickets.
 */

use std::cmp::Ordering;
use std::sync::Arc;

/// Caller-supplied total order over queue elements
pub(super) type Comparator<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

/// Buffered element with its heap ranking
///
/// Ranked by the shared comparator (greater = served first); among equal
/// elements, the earlier insertion wins. The sequence number makes ties
/// stable without requiring the comparator to be injective.
pub(super) struct HeapEntry<T> {
    pub item: T,
    pub seq: u64,
    pub order: Arc<Comparator<T>>,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on the comparator; reversed sequence so older entries
        // surface first among equals.
        (self.order)(&self.item, &other.item).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Element pending direct handoff, ahead of everything buffered
///
/// `ticket` is `Some` when a producer is blocked in `transfer`/
/// `try_transfer_for` waiting for this exact entry to be claimed; `None`
/// for fire-and-forget handoffs from `put`/`try_transfer`.
pub(super) struct HandoffEntry<T> {
    pub item: T,
    pub ticket: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn natural() -> Arc<Comparator<i32>> {
        Arc::new(|a: &i32, b: &i32| a.cmp(b))
    }

    #[test]
    fn test_heap_serves_greatest_first() {
        let order = natural();
        let mut heap = BinaryHeap::new();
        for (seq, item) in [3, 7, 1].into_iter().enumerate() {
            heap.push(HeapEntry {
                item,
                seq: seq as u64,
                order: order.clone(),
            });
        }

        assert_eq!(heap.pop().unwrap().item, 7);
        assert_eq!(heap.pop().unwrap().item, 3);
        assert_eq!(heap.pop().unwrap().item, 1);
    }

    #[test]
    fn test_ties_are_insertion_ordered() {
        // Compare only the priority half, so equal priorities tie
        let order: Arc<Comparator<(i32, &str)>> =
            Arc::new(|a: &(i32, &str), b: &(i32, &str)| a.0.cmp(&b.0));

        let mut heap = BinaryHeap::new();
        for (seq, item) in [(5, "first"), (5, "second"), (5, "third")]
            .into_iter()
            .enumerate()
        {
            heap.push(HeapEntry {
                item,
                seq: seq as u64,
                order: order.clone(),
            });
        }

        assert_eq!(heap.pop().unwrap().item.1, "first");
        assert_eq!(heap.pop().unwrap().item.1, "second");
        assert_eq!(heap.pop().unwrap().item.1, "third");
    }
}
