//! Cross-space agreement tests.
//!
//! The thread-backed space must produce the same results as the serial space
//! for every range shape and chunk size:
//! - Every index is visited exactly once
//! - Reductions match the serial fold
//! - Scans produce the same prefixes and total

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use proptest::prelude::*;
use weft_exec::{ExecutionSpace, Max, RangePolicy, Serial, Sum, Threads};

fn policy(begin: usize, len: usize, chunk: usize) -> RangePolicy {
    RangePolicy::new(begin, begin + len).with_chunk_size(chunk)
}

fn scan<E: ExecutionSpace>(space: &E, policy: &RangePolicy, values: &[u64]) -> (Vec<u64>, u64) {
    let out: Vec<AtomicU64> = values.iter().map(|_| AtomicU64::new(u64::MAX)).collect();
    let begin = policy.begin();
    let total = space.scan_index(policy, &Sum::<u64>::new(), &|i, partial, is_final| {
        if is_final {
            out[i - begin].store(*partial, Ordering::Relaxed);
        }
        *partial += values[i - begin];
    });
    (out.iter().map(|v| v.load(Ordering::Relaxed)).collect(), total)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_for_each_visits_once(
        begin in 0usize..50,
        len in 0usize..300,
        chunk in 0usize..40,
        threads in 1usize..5,
    ) {
        let space = Threads::with_threads(threads).expect("pool");
        let policy = policy(begin, len, chunk);
        let hits: Vec<AtomicUsize> = (0..len).map(|_| AtomicUsize::new(0)).collect();
        space.for_each_index(&policy, &|i| {
            hits[i - begin].fetch_add(1, Ordering::Relaxed);
        });
        prop_assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn prop_reduce_matches_serial(
        values in prop::collection::vec(0u64..1000, 0..300),
        chunk in 0usize..40,
        threads in 1usize..5,
    ) {
        let space = Threads::with_threads(threads).expect("pool");
        let policy = policy(0, values.len(), chunk);

        let sum = |i: usize, acc: &mut u64| *acc += values[i];
        prop_assert_eq!(
            space.reduce_index(&policy, &Sum::new(), &sum),
            Serial.reduce_index(&policy, &Sum::new(), &sum)
        );

        let max = |i: usize, acc: &mut u64| *acc = (*acc).max(values[i]);
        prop_assert_eq!(
            space.reduce_index(&policy, &Max::new(), &max),
            values.iter().copied().max().unwrap_or(0)
        );
    }

    #[test]
    fn prop_scan_matches_serial(
        begin in 0usize..20,
        values in prop::collection::vec(0u64..1000, 0..200),
        chunk in 0usize..40,
        threads in 1usize..5,
    ) {
        let space = Threads::with_threads(threads).expect("pool");
        let policy = policy(begin, values.len(), chunk);
        let (threaded, threaded_total) = scan(&space, &policy, &values);
        let (serial, serial_total) = scan(&Serial, &policy, &values);
        prop_assert_eq!(threaded, serial);
        prop_assert_eq!(threaded_total, serial_total);
        prop_assert_eq!(serial_total, values.iter().sum::<u64>());
    }
}
