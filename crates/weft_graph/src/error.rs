use std::collections::TryReserveError;

use thiserror::Error;
use weft_exec::ExecError;

use crate::graph_impl::GraphId;

/// Errors raised while building a graph.
///
/// Misuse that the API shape cannot rule out, such as linking an already
/// published node, panics instead. Submission never returns an error.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Storage for a node or edge could not be reserved.
    #[error("failed to reserve storage for {what}")]
    AllocationFailed {
        /// What was being allocated.
        what: &'static str,
        /// The allocator's report.
        #[source]
        source: TryReserveError,
    },
    /// A node from another graph was passed to `when_all`.
    #[error("node belongs to {found}, expected a node of {expected}")]
    ForeignNode {
        /// The graph being built.
        expected: GraphId,
        /// The graph the node came from.
        found: GraphId,
    },
    /// `when_all` was called without predecessors.
    #[error("when_all needs at least one predecessor")]
    EmptyJoin,
    /// A kernel strategy could not be built.
    #[error(transparent)]
    Exec(#[from] ExecError),
}
