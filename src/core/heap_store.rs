//! Bounded Binary Min-Heap
//!
//! Array-backed, fixed capacity. All storage is allocated once at
//! construction; insert and extract never allocate.

use crate::error::HeapError;

/// Fixed-capacity binary min-heap of `i32`.
///
/// Invariant: for every `0 < i < len`, `slots[(i - 1) / 2] <= slots[i]`.
/// Slots at or beyond `len` are logically absent and never read.
pub struct HeapStore {
    slots: Box<[i32]>,
    len: usize,
}

#[inline(always)]
const fn parent(index: usize) -> usize {
    (index - 1) / 2
}

impl HeapStore {
    /// Create an empty heap holding at most `capacity` values.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            slots: vec![0i32; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Insert a value, sifting it up toward the root.
    ///
    /// On a full heap the state is left untouched.
    #[inline]
    pub fn insert(&mut self, value: i32) -> Result<(), HeapError> {
        if self.len == self.slots.len() {
            return Err(HeapError::CapacityExceeded {
                capacity: self.slots.len(),
            });
        }

        let mut current = self.len;
        self.slots[current] = value;
        self.len += 1;

        // Equal values never swap.
        while current != 0 && self.slots[parent(current)] > self.slots[current] {
            self.slots.swap(parent(current), current);
            current = parent(current);
        }

        Ok(())
    }

    /// Remove and return the minimum, moving the last value to the root and
    /// sifting it down.
    #[inline]
    pub fn extract_min(&mut self) -> Result<i32, HeapError> {
        if self.len == 0 {
            return Err(HeapError::EmptyHeap);
        }

        let min = self.slots[0];
        self.len -= 1;
        self.slots[0] = self.slots[self.len];
        self.sift_down(0);

        Ok(min)
    }

    /// Drop every value in O(1). Storage is not zeroed.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn sift_down(&mut self, mut current: usize) {
        loop {
            let left = 2 * current + 1;
            let right = left + 1;
            let mut smallest = current;

            if left < self.len && self.slots[left] < self.slots[smallest] {
                smallest = left;
            }
            if right < self.len && self.slots[right] < self.slots[smallest] {
                smallest = right;
            }

            if smallest == current {
                break;
            }
            self.slots.swap(current, smallest);
            current = smallest;
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live portion of the backing array, in heap (not sorted) order.
    pub fn as_slice(&self) -> &[i32] {
        &self.slots[..self.len]
    }

    /// Check the parent-child ordering over the live slots.
    pub fn is_valid(&self) -> bool {
        let live = self.as_slice();
        (1..live.len()).all(|i| live[parent(i)] <= live[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_insert_extract() {
        let mut heap = HeapStore::new(16);

        assert!(heap.is_empty());
        heap.insert(42).unwrap();
        assert_eq!(heap.len(), 1);

        assert_eq!(heap.extract_min(), Ok(42));
        assert!(heap.is_empty());
        assert_eq!(heap.extract_min(), Err(HeapError::EmptyHeap));
    }

    #[test]
    fn test_capacity_four_scenario() {
        let mut heap = HeapStore::new(4);

        for v in [5, 3, 8, 1] {
            heap.insert(v).unwrap();
        }
        assert!(heap.is_full());
        assert_eq!(
            heap.insert(0),
            Err(HeapError::CapacityExceeded { capacity: 4 })
        );
        assert_eq!(heap.len(), 4);

        let drained: Vec<i32> = (0..4).map(|_| heap.extract_min().unwrap()).collect();
        assert_eq!(drained, vec![1, 3, 5, 8]);
        assert_eq!(heap.extract_min(), Err(HeapError::EmptyHeap));
    }

    #[test]
    fn test_capacity_one() {
        let mut heap = HeapStore::new(1);

        heap.insert(7).unwrap();
        assert!(heap.insert(1).is_err());
        assert_eq!(heap.as_slice(), &[7]);
        assert_eq!(heap.extract_min(), Ok(7));
        heap.insert(1).unwrap();
    }

    #[test]
    fn test_equal_values_keep_order() {
        let mut heap = HeapStore::new(8);

        for v in [4, 4, 2, 4, 2, 2] {
            heap.insert(v).unwrap();
            assert!(heap.is_valid());
        }

        let mut out = Vec::new();
        while let Ok(v) = heap.extract_min() {
            assert!(heap.is_valid());
            out.push(v);
        }
        assert_eq!(out, vec![2, 2, 2, 4, 4, 4]);
    }

    #[test]
    fn test_no_swap_on_equal_parent() {
        let mut heap = HeapStore::new(4);

        heap.insert(3).unwrap();
        heap.insert(3).unwrap();
        // Already ordered: the new element stays where it was appended.
        assert_eq!(heap.as_slice(), &[3, 3]);
    }

    #[test]
    fn test_clear() {
        let mut heap = HeapStore::new(4);

        heap.clear();
        assert!(heap.is_empty());

        heap.insert(9).unwrap();
        heap.insert(-2).unwrap();
        heap.clear();
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.extract_min(), Err(HeapError::EmptyHeap));

        // Stale slots are not resurrected.
        heap.insert(5).unwrap();
        assert_eq!(heap.extract_min(), Ok(5));
        assert!(heap.is_empty());
    }

    #[test]
    fn test_extremes() {
        let mut heap = HeapStore::new(4);

        heap.insert(i32::MAX).unwrap();
        heap.insert(i32::MIN).unwrap();
        heap.insert(0).unwrap();

        assert_eq!(heap.extract_min(), Ok(i32::MIN));
        assert_eq!(heap.extract_min(), Ok(0));
        assert_eq!(heap.extract_min(), Ok(i32::MAX));
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_panics() {
        let _ = HeapStore::new(0);
    }
}
