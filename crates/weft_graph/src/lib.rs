//! Deferred task-dependency graphs for weft (Layer 2).
//!
//! `weft_graph` lets callers describe a DAG of kernels once and submit it
//! later. Nodes can only depend on nodes that already exist, so every graph is
//! acyclic by construction and insertion order is a valid execution order.
//!
//! # Core Concepts
//!
//! - [`create_graph`] - Builds a graph inside a closure
//! - [`GraphBuilder`] - Construction surface; top-level `then_*` calls depend
//!   on the root aggregate
//! - [`GraphNodeRef`] - A node under construction; `then_*` appends a
//!   dependent node
//! - [`GraphBuilder::when_all`] - Joins several nodes through an aggregate
//! - [`Graph`] - The finished, shareable, submittable graph
//! - [`KernelDispatch`] - The one entry point every node's kernel exposes
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use weft_graph::create_graph_default;
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let record = |name: &'static str| {
//!     let log = Arc::clone(&log);
//!     move || log.lock().unwrap().push(name)
//! };
//!
//! let graph = create_graph_default(|builder| {
//!     let a = builder.then_kernel("a", record("a"))?;
//!     let b = a.then_kernel("b", record("b"))?;
//!     let c = a.then_kernel("c", record("c"))?;
//!     builder.when_all((b, c))?.then_kernel("d", record("d"))?;
//!     Ok(())
//! })?;
//!
//! graph.submit();
//! assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
//! # Ok::<(), weft_graph::GraphError>(())
//! ```
//!
//! # Architecture
//!
//! - **Layer 0** (`weft_shared`): maybe-reference-counted handles
//! - **Layer 1** (`weft_exec`): execution spaces and strategies
//! - **Layer 2** (`weft_graph`): task graphs (this crate)

/// Graph construction.
pub mod builder;

/// Construction errors.
pub mod error;

/// The public graph handle and entry points.
pub mod graph;

/// Node storage and submission.
pub mod graph_impl;

/// Kernel dispatch.
pub mod kernel;

/// Graph nodes.
pub mod node;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::builder::{GraphBuilder, GraphNodeRef, IntoPredecessors};
    pub use crate::error::GraphError;
    pub use crate::graph::{Graph, SubmitReport, create_graph, create_graph_default};
    pub use crate::graph_impl::{GraphId, GraphImpl};
    pub use crate::kernel::{AggregateKernel, Kernel, KernelDispatch, KernelKind};
    pub use crate::node::{GraphNode, NodeId};
}

pub use builder::{GraphBuilder, GraphNodeRef, IntoPredecessors};
pub use error::GraphError;
pub use graph::{Graph, SubmitReport, create_graph, create_graph_default};
pub use graph_impl::{GraphId, GraphImpl};
pub use kernel::{KernelDispatch, KernelKind};
pub use node::{GraphNode, NodeId};
