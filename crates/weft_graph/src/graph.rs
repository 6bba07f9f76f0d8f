//! The public graph handle and its construction entry points.
//!
//! A [`Graph`] is a shared handle to a fully built [`GraphImpl`]. Building
//! happens inside the closure passed to [`create_graph`]; once the closure
//! returns, the graph can no longer change and can be submitted any number of
//! times.
//!
//! # Example
//!
//! ```
//! use weft_graph::create_graph_default;
//! use weft_exec::{ReduceResult, Sum, View};
//!
//! let data = View::<u64>::new("data", 8);
//! let total = ReduceResult::new();
//!
//! let graph = create_graph_default(|builder| {
//!     let out = data.clone();
//!     let fill = builder.then_parallel_for("fill", 8_usize, move |i| out.set(i, i as u64))?;
//!     let input = data.clone();
//!     fill.then_parallel_reduce(
//!         "sum",
//!         8_usize,
//!         move |i, acc: &mut u64| *acc += input.get(i).unwrap_or(0),
//!         Sum::<u64>::new(),
//!         &total,
//!     )?;
//!     Ok(())
//! })?;
//!
//! let report = graph.submit();
//! assert_eq!(report.nodes_executed, 3);
//! assert_eq!(total.get(), Some(28));
//! # Ok::<(), weft_graph::GraphError>(())
//! ```

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use weft_exec::{ExecutionSpace, Serial};
use weft_shared::SharedHandle;

use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::graph_impl::{GraphId, GraphImpl};

const NULL_GRAPH: &str = "submitted a null Graph; build graphs with create_graph";

/// Result of submitting a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    /// Number of nodes executed, root and aggregates included.
    pub nodes_executed: usize,
    /// Total execution duration.
    pub duration: Duration,
    /// Whether the graph's storage was released during submission.
    pub destructive: bool,
}

/// A built, immutable task graph.
///
/// Clones share the same nodes. A default graph is null and panics when
/// submitted.
pub struct Graph<E: ExecutionSpace = Serial> {
    inner: SharedHandle<GraphImpl<E>>,
}

impl<E: ExecutionSpace> Graph<E> {
    /// Returns `true` for a default-constructed graph.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    /// Number of handles sharing this graph, or 0 for a null graph.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.inner.use_count()
    }

    /// The graph's nodes and edges, or `None` for a null graph.
    #[must_use]
    pub fn get(&self) -> Option<&GraphImpl<E>> {
        self.inner.get()
    }

    /// Number of nodes, root included. Zero for a null graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.get().map_or(0, GraphImpl::node_count)
    }

    /// Number of edges. Zero for a null graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.get().map_or(0, GraphImpl::edge_count)
    }

    /// The space the graph's kernels run on.
    ///
    /// # Panics
    ///
    /// Panics if the graph is null.
    #[must_use]
    pub fn execution_space(&self) -> &E {
        self.inner.get().expect(NULL_GRAPH).execution_space()
    }

    /// The graph's identity, or `None` for a null graph.
    #[must_use]
    pub fn graph_id(&self) -> Option<&GraphId> {
        self.get().map(GraphImpl::id)
    }

    /// Runs every node once, each after all of its predecessors.
    ///
    /// The graph is left intact and may be submitted again.
    ///
    /// # Panics
    ///
    /// Panics if the graph is null.
    pub fn submit(&self) -> SubmitReport {
        let graph = self.inner.get().expect(NULL_GRAPH);
        let span = tracing::info_span!(
            "graph_submit",
            graph = %graph.id(),
            nodes = graph.node_count(),
            space = graph.execution_space().name(),
            destructive = false,
        );
        let _guard = span.enter();

        let start = Instant::now();
        let nodes_executed = graph.submit();
        finish(nodes_executed, start, false)
    }

    /// Runs every node once, releasing storage early when possible.
    ///
    /// When this is the only handle to the graph, each node is freed as soon
    /// as it has run. Otherwise this behaves like [`submit`](Self::submit).
    /// Observable kernel effects are the same either way.
    ///
    /// # Panics
    ///
    /// Panics if the graph is null.
    pub fn submit_once(mut self) -> SubmitReport {
        assert!(!self.inner.is_null(), "{NULL_GRAPH}");
        if self.inner.use_count() != 1 {
            return self.submit();
        }
        let Some(graph) = self.inner.get_mut() else {
            return self.submit();
        };
        let span = tracing::info_span!(
            "graph_submit",
            graph = %graph.id(),
            nodes = graph.node_count(),
            space = graph.execution_space().name(),
            destructive = true,
        );
        let _guard = span.enter();

        let start = Instant::now();
        let nodes_executed = graph.submit_consuming();
        finish(nodes_executed, start, true)
    }
}

fn finish(nodes_executed: usize, start: Instant, destructive: bool) -> SubmitReport {
    let report = SubmitReport {
        nodes_executed,
        duration: start.elapsed(),
        destructive,
    };
    tracing::debug!(
        nodes_executed,
        elapsed = ?report.duration,
        destructive,
        "graph submitted"
    );
    report
}

impl<E: ExecutionSpace> Clone for Graph<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: ExecutionSpace> Default for Graph<E> {
    fn default() -> Self {
        Self {
            inner: SharedHandle::null(),
        }
    }
}

impl<E: ExecutionSpace> fmt::Debug for Graph<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(graph) => f
                .debug_struct("Graph")
                .field("id", graph.id())
                .field("space", graph.execution_space())
                .field("nodes", &graph.node_count())
                .field("edges", &graph.edge_count())
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("Graph(null)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a graph bound to `space`.
///
/// `build` runs immediately on the calling thread with a fresh builder whose
/// root aggregate is already in place. The returned graph is immutable.
///
/// # Errors
///
/// Returns the first error `build` returns, or
/// [`GraphError::AllocationFailed`] if the root cannot be stored.
pub fn create_graph<E, F>(space: E, build: F) -> Result<Graph<E>, GraphError>
where
    E: ExecutionSpace,
    F: FnOnce(&GraphBuilder<E>) -> Result<(), GraphError>,
{
    let builder = GraphBuilder::new(space)?;
    build(&builder)?;
    let graph = builder.finish();
    tracing::debug!(
        graph = %graph.id(),
        space = graph.execution_space().name(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph created"
    );
    Ok(Graph {
        inner: SharedHandle::new(graph),
    })
}

/// Builds a graph bound to the [`Serial`] space. See [`create_graph`].
///
/// # Errors
///
/// Same as [`create_graph`].
pub fn create_graph_default<F>(build: F) -> Result<Graph<Serial>, GraphError>
where
    F: FnOnce(&GraphBuilder<Serial>) -> Result<(), GraphError>,
{
    create_graph(Serial, build)
}
