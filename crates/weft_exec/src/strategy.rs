//! Concrete kernel strategies.
//!
//! A strategy bundles an execution space, an iteration policy and a functor
//! into one value whose [`execute`](ExecutionStrategy::execute) runs the whole
//! kernel to completion. Task graphs store strategies and call `execute`
//! without knowing which kind they hold.

use core::fmt;

use crate::error::ExecError;
use crate::policy::RangePolicy;
use crate::reducer::{ReduceResult, Reducer};
use crate::space::ExecutionSpace;
use crate::view::View;

/// Which family of kernel a strategy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Bulk loop over a range.
    ParallelFor,
    /// Reduction over a range.
    ParallelReduce,
    /// Prefix scan over a range.
    ParallelScan,
    /// Copy between views, or fill of a view.
    DeepCopy,
    /// Anything else, such as a plain closure.
    Custom,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::ParallelFor => "parallel_for",
            StrategyKind::ParallelReduce => "parallel_reduce",
            StrategyKind::ParallelScan => "parallel_scan",
            StrategyKind::DeepCopy => "deep_copy",
            StrategyKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A configured unit of work.
///
/// Any `Fn() + Send + Sync` closure is a [`StrategyKind::Custom`] strategy.
pub trait ExecutionStrategy: Send + Sync + 'static {
    /// Runs the kernel to completion.
    fn execute(&self);

    /// The family this strategy belongs to.
    fn kind(&self) -> StrategyKind {
        StrategyKind::Custom
    }
}

impl<F> ExecutionStrategy for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn execute(&self) {
        self();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ParallelFor
// ─────────────────────────────────────────────────────────────────────────────

/// Calls a functor once per index of a range.
pub struct ParallelFor<E, F> {
    space: E,
    policy: RangePolicy,
    functor: F,
}

impl<E, F> ParallelFor<E, F>
where
    E: ExecutionSpace,
    F: Fn(usize) + Send + Sync + 'static,
{
    /// Creates the strategy.
    #[must_use]
    pub fn new(space: E, policy: impl Into<RangePolicy>, functor: F) -> Self {
        Self {
            space,
            policy: policy.into(),
            functor,
        }
    }

    /// The iteration range.
    #[must_use]
    pub fn policy(&self) -> &RangePolicy {
        &self.policy
    }
}

impl<E, F> ExecutionStrategy for ParallelFor<E, F>
where
    E: ExecutionSpace,
    F: Fn(usize) + Send + Sync + 'static,
{
    fn execute(&self) {
        tracing::trace!(space = self.space.name(), range = %self.policy, "parallel_for");
        self.space.for_each_index(&self.policy, &self.functor);
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ParallelFor
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ParallelReduce
// ─────────────────────────────────────────────────────────────────────────────

/// Reduces a functor over a range and stores the value in a [`ReduceResult`].
pub struct ParallelReduce<E, F, R: Reducer> {
    space: E,
    policy: RangePolicy,
    functor: F,
    reducer: R,
    result: ReduceResult<R::Value>,
}

impl<E, F, R> ParallelReduce<E, F, R>
where
    E: ExecutionSpace,
    R: Reducer,
    F: Fn(usize, &mut R::Value) + Send + Sync + 'static,
{
    /// Creates the strategy. Every run overwrites `result`.
    #[must_use]
    pub fn new(
        space: E,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        result: &ReduceResult<R::Value>,
    ) -> Self {
        Self {
            space,
            policy: policy.into(),
            functor,
            reducer,
            result: result.clone(),
        }
    }
}

impl<E, F, R> ExecutionStrategy for ParallelReduce<E, F, R>
where
    E: ExecutionSpace,
    R: Reducer,
    F: Fn(usize, &mut R::Value) + Send + Sync + 'static,
{
    fn execute(&self) {
        tracing::trace!(space = self.space.name(), range = %self.policy, "parallel_reduce");
        let value = self
            .space
            .reduce_index(&self.policy, &self.reducer, &self.functor);
        self.result.set(value);
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ParallelReduce
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ParallelScan
// ─────────────────────────────────────────────────────────────────────────────

/// Runs a prefix scan over a range and stores the total in a [`ReduceResult`].
///
/// The functor follows the `(index, partial, is_final)` convention described
/// on [`ExecutionSpace`]; it writes its output (typically into a [`View`])
/// only when `is_final` is set.
pub struct ParallelScan<E, F, R: Reducer> {
    space: E,
    policy: RangePolicy,
    functor: F,
    reducer: R,
    total: ReduceResult<R::Value>,
}

impl<E, F, R> ParallelScan<E, F, R>
where
    E: ExecutionSpace,
    R: Reducer,
    F: Fn(usize, &mut R::Value, bool) + Send + Sync + 'static,
{
    /// Creates the strategy. Every run overwrites `total`.
    #[must_use]
    pub fn new(
        space: E,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        total: &ReduceResult<R::Value>,
    ) -> Self {
        Self {
            space,
            policy: policy.into(),
            functor,
            reducer,
            total: total.clone(),
        }
    }
}

impl<E, F, R> ExecutionStrategy for ParallelScan<E, F, R>
where
    E: ExecutionSpace,
    R: Reducer,
    F: Fn(usize, &mut R::Value, bool) + Send + Sync + 'static,
{
    fn execute(&self) {
        tracing::trace!(space = self.space.name(), range = %self.policy, "parallel_scan");
        let total = self
            .space
            .scan_index(&self.policy, &self.reducer, &self.functor);
        self.total.set(total);
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ParallelScan
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DeepCopy
// ─────────────────────────────────────────────────────────────────────────────

enum CopySource<T> {
    View(View<T>),
    Fill(T),
}

/// Copies one view into another, or fills a view with a value.
///
/// # Panics
///
/// Executing a view copy panics if either view was resized after the copy
/// was built.
pub struct DeepCopy<E, T> {
    space: E,
    dst: View<T>,
    source: CopySource<T>,
}

impl<E, T> DeepCopy<E, T>
where
    E: ExecutionSpace,
    T: Clone + Send + Sync + 'static,
{
    /// Copies `src` into `dst`. Copying a view onto itself does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ExtentMismatch`] when the views differ in length.
    pub fn new(space: E, dst: &View<T>, src: &View<T>) -> Result<Self, ExecError> {
        let (dst_len, src_len) = (dst.len(), src.len());
        if dst_len != src_len {
            return Err(ExecError::ExtentMismatch {
                dst: dst_len,
                src: src_len,
            });
        }
        Ok(Self {
            space,
            dst: dst.clone(),
            source: CopySource::View(src.clone()),
        })
    }

    /// Sets every element of `dst` to `value`.
    #[must_use]
    pub fn fill(space: E, dst: &View<T>, value: T) -> Self {
        Self {
            space,
            dst: dst.clone(),
            source: CopySource::Fill(value),
        }
    }
}

impl<E, T> ExecutionStrategy for DeepCopy<E, T>
where
    E: ExecutionSpace,
    T: Clone + Send + Sync + 'static,
{
    fn execute(&self) {
        tracing::trace!(space = self.space.name(), dst = self.dst.label(), "deep_copy");
        match &self.source {
            CopySource::View(src) => {
                if src.shares_storage(&self.dst) {
                    return;
                }
                let data = src.to_vec();
                let mut out = self.dst.write();
                assert_eq!(
                    out.len(),
                    data.len(),
                    "deep copy from {} into {} changed extent after construction",
                    src.label(),
                    self.dst.label()
                );
                for (slot, value) in out.iter_mut().zip(data) {
                    *slot = value;
                }
            }
            CopySource::Fill(value) => {
                self.dst.write().fill(value.clone());
            }
        }
        self.space.fence();
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::DeepCopy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{Min, Sum};
    use crate::space::{Serial, Threads};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parallel_for_writes_view() {
        let out = View::<usize>::new("squares", 6);
        let target = out.clone();
        let kernel = ParallelFor::new(Serial, 6_usize, move |i| target.set(i, i * i));
        assert_eq!(kernel.kind(), StrategyKind::ParallelFor);
        assert_eq!(kernel.policy().len(), 6);
        kernel.execute();
        assert_eq!(out.to_vec(), vec![0, 1, 4, 9, 16, 25]);
    }

    #[test]
    fn parallel_reduce_overwrites_result_each_run() {
        let space = Threads::with_threads(2).expect("pool");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let result = ReduceResult::new();
        let kernel = ParallelReduce::new(
            space,
            RangePolicy::new(10, 20),
            move |i, acc: &mut i64| {
                seen.fetch_add(1, Ordering::Relaxed);
                *acc = (*acc).min(i as i64);
            },
            Min::<i64>::new(),
            &result,
        );
        kernel.execute();
        kernel.execute();
        assert_eq!(result.get(), Some(10));
        assert_eq!(calls.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn parallel_scan_produces_exclusive_prefix() {
        let input = View::from_vec("in", vec![3_u32, 1, 4, 1, 5]);
        let output = View::<u32>::new("out", 5);
        let total = ReduceResult::new();
        let (src, dst) = (input.clone(), output.clone());
        let kernel = ParallelScan::new(
            Threads::with_threads(2).expect("pool"),
            RangePolicy::new(0, 5).with_chunk_size(2),
            move |i, partial: &mut u32, is_final| {
                if is_final {
                    dst.set(i, *partial);
                }
                *partial += src.get(i).unwrap_or_default();
            },
            Sum::<u32>::new(),
            &total,
        );
        kernel.execute();
        assert_eq!(output.to_vec(), vec![0, 3, 4, 8, 9]);
        assert_eq!(total.get(), Some(14));
    }

    #[test]
    fn deep_copy_between_views() {
        let src = View::from_vec("src", vec![1, 2, 3]);
        let dst = View::<i32>::new("dst", 3);
        let copy = DeepCopy::new(Serial, &dst, &src).expect("same extent");
        copy.execute();
        assert_eq!(dst.to_vec(), vec![1, 2, 3]);
        assert_eq!(copy.kind(), StrategyKind::DeepCopy);
    }

    #[test]
    fn deep_copy_rejects_mismatched_extents() {
        let src = View::<i32>::new("src", 3);
        let dst = View::<i32>::new("dst", 4);
        let err = DeepCopy::new(Serial, &dst, &src).err();
        assert!(matches!(
            err,
            Some(ExecError::ExtentMismatch { dst: 4, src: 3 })
        ));
    }

    #[test]
    fn deep_copy_onto_itself_is_a_no_op() {
        let view = View::from_vec("self", vec![5, 6]);
        DeepCopy::new(Serial, &view, &view.clone())
            .expect("same extent")
            .execute();
        assert_eq!(view.to_vec(), vec![5, 6]);
    }

    #[test]
    #[should_panic(expected = "changed extent")]
    fn deep_copy_rejects_resized_views() {
        let src = View::from_vec("src", vec![1, 2, 3]);
        let dst = View::<i32>::new("dst", 3);
        let copy = DeepCopy::new(Serial, &dst, &src).expect("same extent");
        dst.write().push(0);
        copy.execute();
    }

    #[test]
    fn fill_sets_every_element() {
        let view = View::<u8>::new("bytes", 4);
        DeepCopy::fill(Serial, &view, 9).execute();
        assert_eq!(view.to_vec(), vec![9; 4]);
    }

    #[test]
    fn closures_are_custom_strategies() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let kernel = move || {
            counter.fetch_add(1, Ordering::Relaxed);
        };
        kernel.execute();
        assert_eq!(ExecutionStrategy::kind(&kernel), StrategyKind::Custom);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn kind_display() {
        assert_eq!(StrategyKind::ParallelScan.to_string(), "parallel_scan");
    }
}
