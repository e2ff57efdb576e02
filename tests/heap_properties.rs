//! Property tests for the heap and codec laws.

use minheap::protocol::{decode_insert, encode_extract, MAX_ENCODED_LEN};
use minheap::{HeapError, HeapStore};
use proptest::prelude::*;

proptest! {
    #[test]
    fn heap_order_holds_after_inserts(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let mut heap = HeapStore::new(200);
        for v in &values {
            heap.insert(*v).unwrap();
        }

        let live = heap.as_slice();
        for i in 1..live.len() {
            prop_assert!(live[(i - 1) / 2] <= live[i]);
        }
    }

    #[test]
    fn extraction_is_sorted(values in prop::collection::vec(-1000i32..1000, 0..128)) {
        let mut heap = HeapStore::new(128);
        for v in &values {
            heap.insert(*v).unwrap();
        }

        let drained: Vec<i32> = (0..values.len())
            .map(|_| heap.extract_min().unwrap())
            .collect();

        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(drained, expected);
        prop_assert_eq!(heap.extract_min(), Err(HeapError::EmptyHeap));
    }

    #[test]
    fn interleaved_ops_keep_invariant(ops in prop::collection::vec(prop::option::of(any::<i32>()), 0..300)) {
        let mut heap = HeapStore::new(32);
        let mut model: Vec<i32> = Vec::new();

        for op in ops {
            match op {
                Some(v) => {
                    let result = heap.insert(v);
                    if model.len() == 32 {
                        prop_assert_eq!(result, Err(HeapError::CapacityExceeded { capacity: 32 }));
                    } else {
                        prop_assert!(result.is_ok());
                        model.push(v);
                    }
                }
                None => {
                    model.sort_unstable_by(|a, b| b.cmp(a));
                    let expected = model.pop().ok_or(HeapError::EmptyHeap);
                    prop_assert_eq!(heap.extract_min(), expected);
                }
            }
            prop_assert!(heap.is_valid());
            prop_assert_eq!(heap.len(), model.len());
        }
    }

    #[test]
    fn capacity_boundary(capacity in 1usize..64, extra in any::<i32>()) {
        let mut heap = HeapStore::new(capacity);
        for v in 0..capacity as i32 {
            heap.insert(v).unwrap();
        }

        prop_assert_eq!(heap.insert(extra), Err(HeapError::CapacityExceeded { capacity }));
        prop_assert_eq!(heap.len(), capacity);
    }

    #[test]
    fn clear_empties(values in prop::collection::vec(any::<i32>(), 0..50)) {
        let mut heap = HeapStore::new(50);
        for v in &values {
            heap.insert(*v).unwrap();
        }

        heap.clear();
        prop_assert_eq!(heap.len(), 0);
        heap.clear();
        prop_assert_eq!(heap.len(), 0);
        prop_assert_eq!(heap.extract_min(), Err(HeapError::EmptyHeap));
    }

    #[test]
    fn codec_roundtrip(v in any::<i32>()) {
        let encoded = encode_extract(v);
        let bytes = encoded.as_bytes();

        prop_assert_eq!(bytes.last(), Some(&b'\n'));
        let digits = &bytes[..bytes.len() - 1];
        prop_assert_eq!(decode_insert(digits, MAX_ENCODED_LEN + 1), Ok(v));
    }
}
