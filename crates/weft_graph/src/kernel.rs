//! The single execution entry point shared by every node.
//!
//! Graphs store heterogeneous kernels behind [`KernelDispatch`] so that
//! submission can walk one homogeneous node list. Ordinary kernels wrap a
//! [`weft_exec`] strategy; aggregate (join) nodes share one static no-op.

use core::fmt;

use weft_exec::{ExecutionStrategy, StrategyKind};
use weft_shared::SharedHandle;

/// What a node's kernel does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// No-op join node (the root and every `when_all` node).
    Aggregate,
    /// Runs an execution strategy.
    Strategy(StrategyKind),
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Aggregate => f.write_str("aggregate"),
            KernelKind::Strategy(kind) => fmt::Display::fmt(kind, f),
        }
    }
}

/// Runs one node's unit of work to completion.
pub trait KernelDispatch: Send + Sync {
    /// Performs the work. Aggregates do nothing.
    fn execute(&self);

    /// What kind of kernel this is.
    fn kind(&self) -> KernelKind;
}

/// A [`KernelDispatch`] around an execution strategy.
pub struct Kernel<S> {
    strategy: S,
}

impl<S: ExecutionStrategy> Kernel<S> {
    /// Wraps `strategy`.
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// Wraps `strategy` in a managed handle ready to be stored in a node.
    #[must_use]
    pub fn into_handle(self) -> SharedHandle<dyn KernelDispatch> {
        SharedHandle::from_box(Box::new(self))
    }
}

impl<S: ExecutionStrategy> KernelDispatch for Kernel<S> {
    fn execute(&self) {
        self.strategy.execute();
    }

    fn kind(&self) -> KernelKind {
        KernelKind::Strategy(self.strategy.kind())
    }
}

/// The no-op kernel behind every aggregate node.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateKernel;

impl KernelDispatch for AggregateKernel {
    fn execute(&self) {}

    fn kind(&self) -> KernelKind {
        KernelKind::Aggregate
    }
}

static AGGREGATE: AggregateKernel = AggregateKernel;

/// Returns an unmanaged handle to the shared aggregate kernel.
///
/// Every aggregate node holds a copy of this handle; none of them counts or
/// frees anything.
#[must_use]
pub(crate) fn aggregate_kernel() -> SharedHandle<dyn KernelDispatch> {
    let ptr: *mut dyn KernelDispatch = core::ptr::from_ref(&AGGREGATE).cast_mut();
    // SAFETY: `AGGREGATE` lives for the whole program. Unmanaged handles never
    // hand out `&mut`, and aggregate handles never leave this crate, so none
    // is ever assigned into a managed slot.
    unsafe { SharedHandle::unmanaged(ptr) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weft_exec::{ParallelFor, Serial};

    #[test]
    fn aggregate_handles_are_unmanaged_no_ops() {
        let handle = aggregate_kernel();
        assert!(!handle.is_reference_counted());
        assert_eq!(handle.kind(), KernelKind::Aggregate);
        handle.execute();
        assert!(handle.ptr_eq(&aggregate_kernel()));
    }

    #[test]
    fn kernels_forward_to_their_strategy() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let handle = Kernel::new(ParallelFor::new(Serial, 4_usize, move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        }))
        .into_handle();

        assert!(handle.is_reference_counted());
        assert_eq!(handle.kind(), KernelKind::Strategy(StrategyKind::ParallelFor));
        handle.execute();
        assert_eq!(hits.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn kind_display() {
        assert_eq!(KernelKind::Aggregate.to_string(), "aggregate");
        assert_eq!(
            KernelKind::Strategy(StrategyKind::DeepCopy).to_string(),
            "deep_copy"
        );
    }
}
