//! Execution spaces and kernel strategies for weft (Layer 1).
//!
//! `weft_exec` supplies the collaborators a task graph hands its work to:
//!
//! - [`ExecutionSpace`] - Where kernels run ([`Serial`] on the calling thread,
//!   [`Threads`] on a dedicated rayon pool)
//! - [`RangePolicy`] - The iteration space of a bulk kernel
//! - [`Reducer`] - How partial values combine ([`Sum`], [`Prod`], [`Min`], [`Max`])
//! - [`View`] - A labelled, shared 1-D buffer
//! - [`ExecutionStrategy`] - A configured unit of work with a single
//!   "run to completion" entry point ([`ParallelFor`], [`ParallelReduce`],
//!   [`ParallelScan`], [`DeepCopy`])
//!
//! # Example
//!
//! ```
//! use weft_exec::{ExecutionStrategy, ParallelReduce, RangePolicy, ReduceResult, Serial, Sum};
//!
//! let total = ReduceResult::new();
//! let kernel = ParallelReduce::new(
//!     Serial,
//!     RangePolicy::new(0, 5),
//!     |i: usize, acc: &mut u64| *acc += i as u64,
//!     Sum::<u64>::new(),
//!     &total,
//! );
//! kernel.execute();
//! assert_eq!(total.get(), Some(10));
//! ```
//!
//! # Architecture
//!
//! - **Layer 0** (`weft_shared`): maybe-reference-counted handles
//! - **Layer 1** (`weft_exec`): execution spaces and strategies (this crate)
//! - **Layer 2** (`weft_graph`): deferred task graphs built on both

/// Errors raised while configuring spaces and strategies.
pub mod error;

/// Iteration ranges and chunking.
pub mod policy;

/// Value combination for reductions and scans.
pub mod reducer;

/// Execution spaces.
pub mod space;

/// Concrete kernel strategies.
pub mod strategy;

/// Labelled shared buffers.
pub mod view;

pub use error::ExecError;
pub use policy::RangePolicy;
pub use reducer::{Bounded, Max, Min, Prod, ReduceResult, Reducer, Sum};
pub use space::{ExecutionSpace, Serial, Threads};
pub use strategy::{
    DeepCopy, ExecutionStrategy, ParallelFor, ParallelReduce, ParallelScan, StrategyKind,
};
pub use view::View;
