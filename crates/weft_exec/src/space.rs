//! Execution spaces.
//!
//! An [`ExecutionSpace`] runs the index loops of bulk kernels. Every entry
//! point returns only after the whole range has been processed, so
//! [`fence`](ExecutionSpace::fence) has nothing left to wait for on the spaces
//! in this crate.

use core::fmt;
use core::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::ExecError;
use crate::policy::RangePolicy;
use crate::reducer::Reducer;

/// Where kernels run.
///
/// Scans follow the inclusive/exclusive convention of a three-argument body
/// `body(i, partial, is_final)`: the body adds index `i`'s contribution to
/// `partial`, and when `is_final` is set, `partial` holds the running value of
/// every earlier index on entry. A space may call the body more than once per
/// index with `is_final == false` while it computes chunk totals; exactly one
/// call per index has `is_final == true`, and those calls see indices in order
/// within a chunk.
pub trait ExecutionSpace: Clone + fmt::Debug + Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Number of workers kernels are spread across.
    fn concurrency(&self) -> usize;

    /// Waits for all work enqueued on this space.
    fn fence(&self) {}

    /// Calls `body` once for every index of `policy`.
    fn for_each_index(&self, policy: &RangePolicy, body: &(dyn Fn(usize) + Sync));

    /// Reduces `body` over `policy`, starting every partial value from
    /// [`Reducer::init`].
    fn reduce_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value) + Sync),
    ) -> R::Value;

    /// Runs a prefix scan of `body` over `policy` and returns the total.
    fn scan_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value, bool) + Sync),
    ) -> R::Value;
}

// ─────────────────────────────────────────────────────────────────────────────
// Serial
// ─────────────────────────────────────────────────────────────────────────────

/// Runs every kernel on the calling thread, in index order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serial;

impl ExecutionSpace for Serial {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn concurrency(&self) -> usize {
        1
    }

    fn for_each_index(&self, policy: &RangePolicy, body: &(dyn Fn(usize) + Sync)) {
        policy.range().for_each(body);
    }

    fn reduce_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value) + Sync),
    ) -> R::Value {
        reduce_chunk(policy.range(), reducer, body)
    }

    fn scan_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value, bool) + Sync),
    ) -> R::Value {
        let mut partial = reducer.init();
        for i in policy.range() {
            body(i, &mut partial, true);
        }
        partial
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Threads
// ─────────────────────────────────────────────────────────────────────────────

/// Runs kernels on a dedicated rayon thread pool.
///
/// Clones share the pool. Ranges are cut into contiguous chunks (see
/// [`RangePolicy::chunks`]) that workers pick up in parallel; every call blocks
/// until all chunks are done.
///
/// # Example
///
/// ```
/// use weft_exec::{ExecutionSpace, RangePolicy, Sum, Threads};
///
/// let space = Threads::with_threads(2)?;
/// let total = space.reduce_index(
///     &RangePolicy::new(0, 100),
///     &Sum::<u64>::new(),
///     &|i, acc| *acc += i as u64,
/// );
/// assert_eq!(total, 4950);
/// # Ok::<(), weft_exec::ExecError>(())
/// ```
#[derive(Clone)]
pub struct Threads {
    pool: Arc<rayon::ThreadPool>,
}

impl Threads {
    /// Creates a pool with rayon's default thread count.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ThreadPool`] if the pool cannot be started.
    pub fn new() -> Result<Self, ExecError> {
        Self::build(rayon::ThreadPoolBuilder::new())
    }

    /// Creates a pool with exactly `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ZeroThreads`] for `threads == 0` and
    /// [`ExecError::ThreadPool`] if the pool cannot be started.
    pub fn with_threads(threads: usize) -> Result<Self, ExecError> {
        if threads == 0 {
            return Err(ExecError::ZeroThreads);
        }
        Self::build(rayon::ThreadPoolBuilder::new().num_threads(threads))
    }

    fn build(builder: rayon::ThreadPoolBuilder) -> Result<Self, ExecError> {
        let pool = builder
            .thread_name(|index| format!("weft-worker-{index}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), "thread pool started");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn chunks(&self, policy: &RangePolicy) -> Vec<Range<usize>> {
        policy.chunks(self.threads()).collect()
    }
}

impl fmt::Debug for Threads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Threads")
            .field("threads", &self.threads())
            .finish()
    }
}

impl ExecutionSpace for Threads {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn concurrency(&self) -> usize {
        self.threads()
    }

    fn for_each_index(&self, policy: &RangePolicy, body: &(dyn Fn(usize) + Sync)) {
        let chunks = self.chunks(policy);
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .for_each(|chunk| chunk.for_each(body));
        });
    }

    fn reduce_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value) + Sync),
    ) -> R::Value {
        let chunks = self.chunks(policy);
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| reduce_chunk(chunk, reducer, body))
                .reduce(
                    || reducer.init(),
                    |mut acc, partial| {
                        reducer.join(&mut acc, &partial);
                        acc
                    },
                )
        })
    }

    fn scan_index<R: Reducer>(
        &self,
        policy: &RangePolicy,
        reducer: &R,
        body: &(dyn Fn(usize, &mut R::Value, bool) + Sync),
    ) -> R::Value {
        let chunks = self.chunks(policy);
        self.pool.install(|| {
            // Pass 1: every chunk's own total.
            let totals: Vec<R::Value> = chunks
                .par_iter()
                .map(|chunk| {
                    let mut partial = reducer.init();
                    for i in chunk.clone() {
                        body(i, &mut partial, false);
                    }
                    partial
                })
                .collect();

            // Exclusive prefix over chunk totals.
            let mut offsets = Vec::with_capacity(totals.len());
            let mut running = reducer.init();
            for total in &totals {
                offsets.push(running.clone());
                reducer.join(&mut running, total);
            }

            // Pass 2: replay each chunk from its offset with final calls.
            chunks
                .into_par_iter()
                .zip(offsets.into_par_iter())
                .for_each(|(chunk, mut partial)| {
                    for i in chunk {
                        body(i, &mut partial, true);
                    }
                });
            running
        })
    }
}

fn reduce_chunk<R: Reducer>(
    chunk: Range<usize>,
    reducer: &R,
    body: &(dyn Fn(usize, &mut R::Value) + Sync),
) -> R::Value {
    let mut partial = reducer.init();
    for i in chunk {
        body(i, &mut partial);
    }
    partial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{Max, Sum};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn exclusive_scan<E: ExecutionSpace>(space: &E, values: &[u64]) -> (Vec<u64>, u64) {
        let out: Vec<AtomicUsize> = values.iter().map(|_| AtomicUsize::new(0)).collect();
        let total = space.scan_index(
            &RangePolicy::new(0, values.len()).with_chunk_size(3),
            &Sum::<u64>::new(),
            &|i, partial: &mut u64, is_final| {
                if is_final {
                    out[i].store(*partial as usize, Ordering::Relaxed);
                }
                *partial += values[i];
            },
        );
        let prefixes = out.iter().map(|v| v.load(Ordering::Relaxed) as u64).collect();
        (prefixes, total)
    }

    #[test]
    fn serial_visits_in_order() {
        let seen = parking_lot::Mutex::new(Vec::new());
        Serial.for_each_index(&RangePolicy::new(2, 6), &|i| seen.lock().push(i));
        assert_eq!(seen.into_inner(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn threads_visit_every_index_once() {
        let space = Threads::with_threads(3).expect("pool");
        let hits: Vec<AtomicUsize> = (0..257).map(|_| AtomicUsize::new(0)).collect();
        space.for_each_index(&RangePolicy::new(0, 257), &|i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn reductions_agree() {
        let space = Threads::with_threads(4).expect("pool");
        let policy = RangePolicy::new(0, 1000);
        let body = |i: usize, acc: &mut u64| *acc += i as u64;
        let serial = Serial.reduce_index(&policy, &Sum::new(), &body);
        let threaded = space.reduce_index(&policy, &Sum::new(), &body);
        assert_eq!(serial, 499_500);
        assert_eq!(threaded, serial);

        let max = space.reduce_index(&policy, &Max::<i64>::new(), &|i, acc: &mut i64| {
            *acc = (*acc).max(-(i as i64 - 300).abs());
        });
        assert_eq!(max, 0);
    }

    #[test]
    fn empty_range_reduces_to_identity() {
        let space = Threads::with_threads(2).expect("pool");
        let total = space.reduce_index(&RangePolicy::new(5, 5), &Sum::<u32>::new(), &|_, acc| {
            *acc += 1;
        });
        assert_eq!(total, 0);
    }

    #[test]
    fn scans_agree() {
        let values: Vec<u64> = (1..=20).collect();
        let space = Threads::with_threads(3).expect("pool");
        let (serial, serial_total) = exclusive_scan(&Serial, &values);
        let (threaded, threaded_total) = exclusive_scan(&space, &values);
        assert_eq!(serial[..4], [0, 1, 3, 6]);
        assert_eq!(serial_total, 210);
        assert_eq!(threaded, serial);
        assert_eq!(threaded_total, serial_total);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(
            Threads::with_threads(0),
            Err(ExecError::ZeroThreads)
        ));
    }

    #[test]
    fn names_and_concurrency() {
        let space = Threads::with_threads(2).expect("pool");
        assert_eq!(space.name(), "threads");
        assert_eq!(space.concurrency(), 2);
        assert_eq!(Serial.name(), "serial");
        assert_eq!(Serial.concurrency(), 1);
        assert!(format!("{space:?}").contains("threads: 2"));
    }
}
