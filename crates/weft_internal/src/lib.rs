//! # weft Internal Library
//!
//! Re-exports the core weft crates for convenience.

/// Layer 0: Maybe-reference-counted shared handles.
pub use weft_shared;

/// Layer 1: Execution spaces and kernel strategies.
pub use weft_exec;

/// Layer 2: Deferred task graphs.
pub use weft_graph;

/// Logging and runtime configuration.
pub use weft_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use weft_core::{RuntimeConfig, TracingConfig, TracingFormat};
    pub use weft_exec::{
        DeepCopy, ExecutionSpace, ExecutionStrategy, Max, Min, ParallelFor, ParallelReduce,
        ParallelScan, Prod, RangePolicy, ReduceResult, Reducer, Serial, Sum, Threads, View,
    };
    pub use weft_graph::prelude::*;
    pub use weft_shared::SharedHandle;
}
