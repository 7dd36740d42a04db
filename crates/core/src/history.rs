//! Fixed-capacity FIFO history.
//!
//! Used for the orchestrator's error log, the suggestion queue, the performance
//! sample ring and the simulator's action log. Pushing onto a full history evicts
//! the oldest entry, so `len() <= capacity()` holds at all times.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedHistory<T> {
    /// Create an empty history. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an entry, returning the evicted oldest entry when at capacity.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Most recently pushed entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Clone of the last `n` entries, oldest first.
    pub fn recent_vec(&self, n: usize) -> Vec<T> {
        self.recent(n).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for BoundedHistory<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_first() {
        let mut h = BoundedHistory::new(3);
        for i in 0..3 {
            assert_eq!(h.push(i), None);
        }
        assert_eq!(h.push(3), Some(0));
        assert_eq!(h.push(4), Some(1));
        assert_eq!(h.to_vec(), vec![2, 3, 4]);
        assert_eq!(h.latest(), Some(&4));
    }

    #[test]
    fn recent_returns_tail_in_chronological_order() {
        let mut h = BoundedHistory::new(10);
        for i in 0..6 {
            h.push(i);
        }
        assert_eq!(h.recent_vec(2), vec![4, 5]);
        assert_eq!(h.recent_vec(50), vec![0, 1, 2, 3, 4, 5]);
        assert!(h.recent_vec(0).is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut h = BoundedHistory::new(0);
        h.push("a");
        h.push("b");
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.to_vec(), vec!["b"]);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 1usize..64, pushes in 0usize..300) {
            let mut h = BoundedHistory::new(capacity);
            for i in 0..pushes {
                h.push(i);
                prop_assert!(h.len() <= capacity);
            }
            // The retained window is always the newest `min(pushes, capacity)` entries.
            let expected: Vec<usize> = (pushes.saturating_sub(capacity)..pushes).collect();
            prop_assert_eq!(h.to_vec(), expected);
        }
    }
}
