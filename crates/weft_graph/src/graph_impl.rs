//! Node storage and the submission algorithm for one graph.
//!
//! [`GraphImpl`] is an append-only arena of [`GraphNode`]s. Node identities are
//! arena indices, and a node may only list predecessors with a smaller index,
//! so insertion order is always a topological order and no cycle can be
//! expressed. Submission walks the arena front to back.

use core::fmt;
use std::sync::Arc;

use weft_exec::ExecutionSpace;
use weft_shared::SharedHandle;

use crate::error::GraphError;
use crate::kernel::{KernelDispatch, aggregate_kernel};
use crate::node::{GraphNode, NodeId};

/// Unique identifier for a graph.
///
/// Graph IDs are generated using nanoid, so graphs built independently never
/// collide. Internally uses `Arc<str>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphId(Arc<str>);

impl GraphId {
    /// Creates a new graph ID with a unique nanoid.
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid::nanoid!().into())
    }

    /// Creates a graph ID from a specific string value.
    #[must_use]
    pub fn from_string(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph_{}", self.0)
    }
}

/// All nodes and edges of one graph, bound to one execution space.
pub struct GraphImpl<E: ExecutionSpace> {
    id: GraphId,
    space: E,
    nodes: Vec<GraphNode>,
}

impl<E: ExecutionSpace> GraphImpl<E> {
    /// Creates a graph holding only its published root aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the root cannot be stored.
    pub fn new(space: E) -> Result<Self, GraphError> {
        let mut graph = Self {
            id: GraphId::new(),
            space,
            nodes: Vec::new(),
        };
        let root = graph.add_node("root", aggregate_kernel())?;
        graph.publish(root);
        Ok(graph)
    }

    /// This graph's identity.
    #[must_use]
    pub fn id(&self) -> &GraphId {
        &self.id
    }

    /// The space kernels run on.
    #[must_use]
    pub fn execution_space(&self) -> &E {
        &self.space
    }

    /// The root aggregate.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// All nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of predecessor edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.predecessors().len()).sum()
    }

    /// Appends an open node with no predecessors.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if node storage cannot grow.
    pub fn add_node(
        &mut self,
        label: &'static str,
        kernel: SharedHandle<dyn KernelDispatch>,
    ) -> Result<NodeId, GraphError> {
        self.nodes
            .try_reserve(1)
            .map_err(|source| GraphError::AllocationFailed {
                what: "graph node",
                source,
            })?;
        let id = NodeId(self.nodes.len());
        let node = GraphNode::new(id, label, kernel);
        tracing::trace!(graph = %self.id, node = %id, label, kind = %node.kind(), "node added");
        self.nodes.push(node);
        Ok(id)
    }

    /// Makes `node` wait for `predecessor`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the edge cannot be stored.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist or is already published, or if
    /// `predecessor` was not created before `node`.
    pub fn add_predecessor(&mut self, node: NodeId, predecessor: NodeId) -> Result<(), GraphError> {
        assert!(
            predecessor < node,
            "{predecessor} must be created before {node} to precede it"
        );
        let target = self
            .nodes
            .get_mut(node.index())
            .unwrap_or_else(|| panic!("{node} is not part of this graph"));
        assert!(
            !target.is_published(),
            "cannot add a predecessor to published {node}"
        );

        let edges = target.predecessors_mut();
        if edges.contains(&predecessor) {
            return Ok(());
        }
        edges
            .try_reserve(1)
            .map_err(|source| GraphError::AllocationFailed {
                what: "graph edge",
                source,
            })?;
        edges.push(predecessor);
        tracing::trace!(graph = %self.id, node = %node, predecessor = %predecessor, "edge added");
        Ok(())
    }

    /// Freezes `node`'s predecessor list.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn publish(&mut self, node: NodeId) {
        self.nodes
            .get_mut(node.index())
            .unwrap_or_else(|| panic!("{node} is not part of this graph"))
            .publish();
    }

    /// Adds a published aggregate node waiting for every node in
    /// `predecessors`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if storage cannot grow; the
    /// graph is left as it was.
    pub fn create_aggregate(&mut self, predecessors: &[NodeId]) -> Result<NodeId, GraphError> {
        self.add_linked_node("when_all", aggregate_kernel(), predecessors)
    }

    /// Adds a node, links it to `predecessors` and publishes it.
    ///
    /// Either the node is fully linked and published, or it is not added at
    /// all.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if storage cannot grow.
    pub fn add_linked_node(
        &mut self,
        label: &'static str,
        kernel: SharedHandle<dyn KernelDispatch>,
        predecessors: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let id = self.add_node(label, kernel)?;
        let linked = predecessors
            .iter()
            .try_for_each(|&predecessor| self.add_predecessor(id, predecessor));
        if let Err(err) = linked {
            self.nodes.pop();
            return Err(err);
        }
        self.publish(id);
        Ok(id)
    }

    /// Runs every node once, in insertion order, then fences the space.
    ///
    /// Returns the number of nodes executed. The graph is left intact and
    /// may be submitted again.
    pub fn submit(&self) -> usize {
        for node in &self.nodes {
            tracing::trace!(node = %node.id(), label = node.label(), "executing node");
            node.execute();
        }
        self.space.fence();
        self.nodes.len()
    }

    /// Runs every node once and releases each one as soon as it has run.
    ///
    /// Returns the number of nodes executed. The graph is empty afterwards.
    pub fn submit_consuming(&mut self) -> usize {
        let nodes = core::mem::take(&mut self.nodes);
        let executed = nodes.len();
        for node in nodes {
            tracing::trace!(node = %node.id(), label = node.label(), "executing node");
            node.execute();
        }
        self.space.fence();
        executed
    }
}

impl<E: ExecutionSpace> fmt::Debug for GraphImpl<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphImpl")
            .field("id", &self.id)
            .field("space", &self.space)
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use std::sync::Mutex;
    use weft_exec::Serial;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> SharedHandle<dyn KernelDispatch> {
        let log = Arc::clone(log);
        Kernel::new(move || log.lock().expect("log poisoned").push(name)).into_handle()
    }

    #[test]
    fn new_graph_has_published_root() {
        let graph = GraphImpl::new(Serial).expect("graph");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        let root = graph.node(graph.root()).expect("root");
        assert!(root.is_aggregate());
        assert!(root.is_published());
        assert!(root.predecessors().is_empty());
    }

    #[test]
    fn add_node_then_link() {
        let mut graph = GraphImpl::new(Serial).expect("graph");
        let a = graph.add_node("a", aggregate_kernel()).expect("a");
        graph.add_predecessor(a, graph.root()).expect("edge");
        graph.add_predecessor(a, graph.root()).expect("duplicate edge");
        graph.publish(a);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node(a).map(GraphNode::predecessors), Some(&[NodeId::ROOT][..]));
    }

    #[test]
    #[should_panic(expected = "published")]
    fn linking_published_node_panics() {
        let mut graph = GraphImpl::new(Serial).expect("graph");
        let a = graph.add_linked_node("a", aggregate_kernel(), &[NodeId::ROOT]).expect("a");
        let b = graph.add_node("b", aggregate_kernel()).expect("b");
        graph.publish(b);
        graph.add_predecessor(b, a).expect("unreachable");
    }

    #[test]
    #[should_panic(expected = "must be created before")]
    fn back_edge_panics() {
        let mut graph = GraphImpl::new(Serial).expect("graph");
        let a = graph.add_node("a", aggregate_kernel()).expect("a");
        graph.add_predecessor(a, NodeId::new(5)).expect("unreachable");
    }

    #[test]
    fn aggregate_joins_all_predecessors() {
        let mut graph = GraphImpl::new(Serial).expect("graph");
        let a = graph.add_linked_node("a", aggregate_kernel(), &[NodeId::ROOT]).expect("a");
        let b = graph.add_linked_node("b", aggregate_kernel(), &[NodeId::ROOT]).expect("b");
        let join = graph.create_aggregate(&[a, b]).expect("join");
        let node = graph.node(join).expect("join node");
        assert!(node.is_aggregate());
        assert!(node.is_published());
        assert_eq!(node.predecessors(), &[a, b]);
    }

    #[test]
    fn submit_runs_in_insertion_order_and_repeats() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = GraphImpl::new(Serial).expect("graph");
        let a = graph.add_linked_node("a", recorder(&log, "a"), &[NodeId::ROOT]).expect("a");
        graph.add_linked_node("b", recorder(&log, "b"), &[a]).expect("b");

        assert_eq!(graph.submit(), 3);
        assert_eq!(graph.submit(), 3);
        assert_eq!(*log.lock().expect("log"), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn consuming_submit_empties_graph() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = GraphImpl::new(Serial).expect("graph");
        graph.add_linked_node("a", recorder(&log, "a"), &[NodeId::ROOT]).expect("a");

        assert_eq!(graph.submit_consuming(), 2);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(*log.lock().expect("log"), vec!["a"]);
    }

    #[test]
    fn graph_ids_are_unique() {
        assert_ne!(GraphId::new(), GraphId::new());
        assert_eq!(GraphId::from_string("x").to_string(), "graph_x");
    }
}
