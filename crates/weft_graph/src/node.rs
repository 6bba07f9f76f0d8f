//! Nodes of a task graph.
//!
//! A node is a kernel plus the identities of the nodes it waits for. Its
//! predecessors are fixed while the node is being created; once the node is
//! published (handed back to the caller) the list is frozen.

use core::fmt;

use weft_shared::SharedHandle;

use crate::kernel::{KernelDispatch, KernelKind};

/// Position of a node inside its graph.
///
/// Identities are dense and follow insertion order, which is also a valid
/// execution order: a node can only depend on nodes with smaller identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root aggregate every graph starts with.
    pub const ROOT: NodeId = NodeId(0);

    /// Creates a node ID.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// A vertex of the graph: a kernel and the nodes it waits for.
pub struct GraphNode {
    id: NodeId,
    label: &'static str,
    kernel: SharedHandle<dyn KernelDispatch>,
    predecessors: Vec<NodeId>,
    published: bool,
}

impl GraphNode {
    pub(crate) fn new(
        id: NodeId,
        label: &'static str,
        kernel: SharedHandle<dyn KernelDispatch>,
    ) -> Self {
        Self {
            id,
            label,
            kernel,
            predecessors: Vec::new(),
            published: false,
        }
    }

    /// This node's identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Human-readable label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// What the node's kernel does.
    #[must_use]
    pub fn kind(&self) -> KernelKind {
        self.kernel.kind()
    }

    /// Returns `true` for the root and `when_all` nodes.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.kind() == KernelKind::Aggregate
    }

    /// Nodes that must finish before this one runs.
    #[must_use]
    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    /// Returns `true` once the predecessor list is frozen.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// The kernel this node runs.
    #[must_use]
    pub fn kernel(&self) -> &dyn KernelDispatch {
        &*self.kernel
    }

    pub(crate) fn predecessors_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.predecessors
    }

    pub(crate) fn publish(&mut self) {
        self.published = true;
    }

    pub(crate) fn execute(&self) {
        self.kernel.execute();
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("predecessors", &self.predecessors)
            .field("published", &self.published)
            .finish()
    }
}
