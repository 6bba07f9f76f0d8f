//! The construction surface handed to `create_graph` closures.
//!
//! A [`GraphBuilder`] owns the graph while it is being built. Node references
//! ([`GraphNodeRef`]) borrow the builder, so they cannot escape the
//! construction closure, and every `then_*` call appends a node that depends
//! on the node it was called on.

use core::cell::RefCell;
use core::fmt;

use hashbrown::HashSet;
use variadics_please::all_tuples;
use weft_exec::{
    DeepCopy, ExecutionSpace, ExecutionStrategy, ParallelFor, ParallelReduce, ParallelScan,
    RangePolicy, ReduceResult, Reducer, View,
};
use weft_shared::SharedHandle;

use crate::error::GraphError;
use crate::graph_impl::{GraphId, GraphImpl};
use crate::kernel::{Kernel, KernelDispatch};
use crate::node::NodeId;

/// Builds one graph.
///
/// The builder is single-threaded: it is not `Sync`, so node references
/// cannot be shared with other threads while the graph is under construction.
pub struct GraphBuilder<E: ExecutionSpace> {
    graph: RefCell<GraphImpl<E>>,
}

impl<E: ExecutionSpace> GraphBuilder<E> {
    pub(crate) fn new(space: E) -> Result<Self, GraphError> {
        Ok(Self {
            graph: RefCell::new(GraphImpl::new(space)?),
        })
    }

    pub(crate) fn finish(self) -> GraphImpl<E> {
        self.graph.into_inner()
    }

    /// The root aggregate. Top-level `then_*` calls depend on it.
    #[must_use]
    pub fn root(&self) -> GraphNodeRef<'_, E> {
        GraphNodeRef {
            builder: self,
            id: NodeId::ROOT,
        }
    }

    /// A clone of the space the graph is bound to.
    #[must_use]
    pub fn execution_space(&self) -> E {
        self.graph.borrow().execution_space().clone()
    }

    /// The identity of the graph under construction.
    #[must_use]
    pub fn graph_id(&self) -> GraphId {
        self.graph.borrow().id().clone()
    }

    /// Number of nodes so far, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.borrow().node_count()
    }

    /// Number of edges so far.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.borrow().edge_count()
    }

    /// Adds a bulk loop depending on the root. See
    /// [`GraphNodeRef::then_parallel_for`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_for<F>(
        &self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
    ) -> Result<GraphNodeRef<'_, E>, GraphError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.root().then_parallel_for(label, policy, functor)
    }

    /// Adds a reduction depending on the root. See
    /// [`GraphNodeRef::then_parallel_reduce`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_reduce<F, R>(
        &self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        result: &ReduceResult<R::Value>,
    ) -> Result<GraphNodeRef<'_, E>, GraphError>
    where
        R: Reducer,
        F: Fn(usize, &mut R::Value) + Send + Sync + 'static,
    {
        self.root()
            .then_parallel_reduce(label, policy, functor, reducer, result)
    }

    /// Adds a scan depending on the root. See
    /// [`GraphNodeRef::then_parallel_scan`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_scan<F, R>(
        &self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        total: &ReduceResult<R::Value>,
    ) -> Result<GraphNodeRef<'_, E>, GraphError>
    where
        R: Reducer,
        F: Fn(usize, &mut R::Value, bool) + Send + Sync + 'static,
    {
        self.root()
            .then_parallel_scan(label, policy, functor, reducer, total)
    }

    /// Adds a view copy depending on the root. See
    /// [`GraphNodeRef::then_deep_copy`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Exec`] when the views differ in length and
    /// [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_deep_copy<T>(
        &self,
        label: &'static str,
        dst: &View<T>,
        src: &View<T>,
    ) -> Result<GraphNodeRef<'_, E>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.root().then_deep_copy(label, dst, src)
    }

    /// Adds a view fill depending on the root. See [`GraphNodeRef::then_fill`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_fill<T>(
        &self,
        label: &'static str,
        dst: &View<T>,
        value: T,
    ) -> Result<GraphNodeRef<'_, E>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.root().then_fill(label, dst, value)
    }

    /// Adds an arbitrary strategy depending on the root. See
    /// [`GraphNodeRef::then_kernel`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_kernel<S: ExecutionStrategy>(
        &self,
        label: &'static str,
        strategy: S,
    ) -> Result<GraphNodeRef<'_, E>, GraphError> {
        self.root().then_kernel(label, strategy)
    }

    /// Adds an aggregate node that runs after every node in `predecessors`.
    ///
    /// `predecessors` can be a single node reference, a tuple of up to 16
    /// predecessor sources, an array, a slice or a `Vec`. Repeated nodes are
    /// linked once.
    ///
    /// # Errors
    ///
    /// - [`GraphError::EmptyJoin`] when `predecessors` is empty
    /// - [`GraphError::ForeignNode`] when a reference belongs to another builder
    /// - [`GraphError::AllocationFailed`] if the node cannot be stored
    pub fn when_all<'b, P>(&'b self, predecessors: P) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        P: IntoPredecessors<'b, E>,
    {
        let mut refs = Vec::new();
        predecessors.collect_into(&mut refs);
        if refs.is_empty() {
            return Err(GraphError::EmptyJoin);
        }

        let mut seen = HashSet::with_capacity(refs.len());
        let mut ids = Vec::with_capacity(refs.len());
        for node in refs {
            if !core::ptr::eq(node.builder, self) {
                return Err(GraphError::ForeignNode {
                    expected: self.graph_id(),
                    found: node.builder.graph_id(),
                });
            }
            if seen.insert(node.id) {
                ids.push(node.id);
            }
        }

        let id = self.graph.borrow_mut().create_aggregate(&ids)?;
        Ok(GraphNodeRef { builder: self, id })
    }

    fn push_node(
        &self,
        label: &'static str,
        kernel: SharedHandle<dyn KernelDispatch>,
        predecessor: NodeId,
    ) -> Result<GraphNodeRef<'_, E>, GraphError> {
        let id = self
            .graph
            .borrow_mut()
            .add_linked_node(label, kernel, &[predecessor])?;
        Ok(GraphNodeRef { builder: self, id })
    }
}

impl<E: ExecutionSpace> fmt::Debug for GraphBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("graph", &self.graph.borrow().id())
            .field("nodes", &self.node_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GraphNodeRef
// ─────────────────────────────────────────────────────────────────────────────

/// A published node of the graph under construction.
///
/// References are `Copy` and only live as long as the builder.
pub struct GraphNodeRef<'b, E: ExecutionSpace> {
    builder: &'b GraphBuilder<E>,
    id: NodeId,
}

impl<E: ExecutionSpace> Clone for GraphNodeRef<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ExecutionSpace> Copy for GraphNodeRef<'_, E> {}

impl<E: ExecutionSpace> PartialEq for GraphNodeRef<'_, E> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.builder, other.builder) && self.id == other.id
    }
}

impl<E: ExecutionSpace> Eq for GraphNodeRef<'_, E> {}

impl<E: ExecutionSpace> fmt::Debug for GraphNodeRef<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GraphNodeRef").field(&self.id).finish()
    }
}

impl<'b, E: ExecutionSpace> GraphNodeRef<'b, E> {
    /// The referenced node's identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Adds a node calling `functor` once per index of `policy`, after this
    /// node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_for<F>(
        self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
    ) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let strategy = ParallelFor::new(self.builder.execution_space(), policy, functor);
        self.then_kernel(label, strategy)
    }

    /// Adds a node reducing `functor` over `policy` into `result`, after this
    /// node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_reduce<F, R>(
        self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        result: &ReduceResult<R::Value>,
    ) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        R: Reducer,
        F: Fn(usize, &mut R::Value) + Send + Sync + 'static,
    {
        let strategy = ParallelReduce::new(
            self.builder.execution_space(),
            policy,
            functor,
            reducer,
            result,
        );
        self.then_kernel(label, strategy)
    }

    /// Adds a node scanning `functor` over `policy`, storing the total in
    /// `total`, after this node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_parallel_scan<F, R>(
        self,
        label: &'static str,
        policy: impl Into<RangePolicy>,
        functor: F,
        reducer: R,
        total: &ReduceResult<R::Value>,
    ) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        R: Reducer,
        F: Fn(usize, &mut R::Value, bool) + Send + Sync + 'static,
    {
        let strategy = ParallelScan::new(
            self.builder.execution_space(),
            policy,
            functor,
            reducer,
            total,
        );
        self.then_kernel(label, strategy)
    }

    /// Adds a node copying `src` into `dst`, after this node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Exec`] when the views differ in length and
    /// [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_deep_copy<T>(
        self,
        label: &'static str,
        dst: &View<T>,
        src: &View<T>,
    ) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let strategy = DeepCopy::new(self.builder.execution_space(), dst, src)?;
        self.then_kernel(label, strategy)
    }

    /// Adds a node setting every element of `dst` to `value`, after this node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_fill<T>(
        self,
        label: &'static str,
        dst: &View<T>,
        value: T,
    ) -> Result<GraphNodeRef<'b, E>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let strategy = DeepCopy::fill(self.builder.execution_space(), dst, value);
        self.then_kernel(label, strategy)
    }

    /// Adds a node running `strategy`, after this node.
    ///
    /// Any `Fn() + Send + Sync + 'static` closure is a strategy.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AllocationFailed`] if the node cannot be stored.
    pub fn then_kernel<S: ExecutionStrategy>(
        self,
        label: &'static str,
        strategy: S,
    ) -> Result<GraphNodeRef<'b, E>, GraphError> {
        self.builder
            .push_node(label, Kernel::new(strategy).into_handle(), self.id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoPredecessors
// ─────────────────────────────────────────────────────────────────────────────

/// Anything `when_all` accepts as a predecessor set.
pub trait IntoPredecessors<'b, E: ExecutionSpace> {
    /// Appends the referenced nodes to `out`.
    fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>);
}

impl<'b, E: ExecutionSpace> IntoPredecessors<'b, E> for GraphNodeRef<'b, E> {
    fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>) {
        out.push(self);
    }
}

impl<'b, E: ExecutionSpace> IntoPredecessors<'b, E> for Vec<GraphNodeRef<'b, E>> {
    fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>) {
        out.extend(self);
    }
}

impl<'b, E: ExecutionSpace> IntoPredecessors<'b, E> for &[GraphNodeRef<'b, E>] {
    fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>) {
        out.extend_from_slice(self);
    }
}

impl<'b, E: ExecutionSpace, const N: usize> IntoPredecessors<'b, E> for [GraphNodeRef<'b, E>; N] {
    fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>) {
        out.extend(self);
    }
}

macro_rules! impl_into_predecessors_for_tuple {
    ($(($P:ident, $p:ident)),*) => {
        impl<'b, E: ExecutionSpace, $($P: IntoPredecessors<'b, E>),*> IntoPredecessors<'b, E> for ($($P,)*) {
            fn collect_into(self, out: &mut Vec<GraphNodeRef<'b, E>>) {
                let ($($p,)*) = self;
                $($p.collect_into(out);)*
            }
        }
    };
}

// Generate implementations for tuples from 2 to 16 elements
all_tuples!(impl_into_predecessors_for_tuple, 2, 16, P, p);

#[cfg(test)]
mod tests {
    use super::*;
    use weft_exec::Serial;

    fn builder() -> GraphBuilder<Serial> {
        GraphBuilder::new(Serial).expect("builder")
    }

    #[test]
    fn then_chains_depend_on_receiver() {
        let b = builder();
        let a = b.then_kernel("a", || {}).expect("a");
        let c = a.then_kernel("c", || {}).expect("c");
        let (a, c) = (a.id(), c.id());
        let graph = b.finish();
        assert_eq!(graph.node(a).map(|n| n.predecessors().to_vec()), Some(vec![NodeId::ROOT]));
        assert_eq!(graph.node(c).map(|n| n.predecessors().to_vec()), Some(vec![a]));
    }

    #[test]
    fn when_all_accepts_many_shapes() {
        let b = builder();
        let x = b.then_kernel("x", || {}).expect("x");
        let y = b.then_kernel("y", || {}).expect("y");
        let z = b.then_kernel("z", || {}).expect("z");

        let single = b.when_all(x).expect("single");
        let pair = b.when_all((x, y)).expect("pair");
        let nested = b.when_all((x, [y, z])).expect("nested");
        let listed = b.when_all(vec![z, y]).expect("vec");
        let sliced = b.when_all(&[x, z][..]).expect("slice");

        let (x, y, z) = (x.id(), y.id(), z.id());
        let joins = [single, pair, nested, listed, sliced].map(|r| r.id());
        let graph = b.finish();
        let preds = |id: NodeId| graph.node(id).map(|n| n.predecessors().to_vec());
        assert_eq!(preds(joins[0]), Some(vec![x]));
        assert_eq!(preds(joins[1]), Some(vec![x, y]));
        assert_eq!(preds(joins[2]), Some(vec![x, y, z]));
        assert_eq!(preds(joins[3]), Some(vec![z, y]));
        assert_eq!(preds(joins[4]), Some(vec![x, z]));
    }

    #[test]
    fn when_all_dedupes() {
        let b = builder();
        let x = b.then_kernel("x", || {}).expect("x");
        let join = b.when_all((x, x, x)).expect("join").id();
        let graph = b.finish();
        assert_eq!(graph.node(join).map(|n| n.predecessors().len()), Some(1));
    }

    #[test]
    fn when_all_rejects_empty() {
        let b = builder();
        let none: Vec<GraphNodeRef<'_, Serial>> = Vec::new();
        assert!(matches!(b.when_all(none), Err(GraphError::EmptyJoin)));
        assert_eq!(b.node_count(), 1);
    }

    #[test]
    fn when_all_rejects_foreign_nodes() {
        let mine = builder();
        let other = builder();
        let theirs = other.then_kernel("theirs", || {}).expect("theirs");
        let err = mine.when_all((mine.root(), theirs)).err();
        match err {
            Some(GraphError::ForeignNode { expected, found }) => {
                assert_eq!(expected, mine.graph_id());
                assert_eq!(found, other.graph_id());
            }
            unexpected => panic!("expected ForeignNode, got {unexpected:?}"),
        }
        assert_eq!(mine.node_count(), 1);
    }

    #[test]
    fn deep_copy_extent_mismatch_is_reported() {
        let b = builder();
        let src = View::<u8>::new("src", 2);
        let dst = View::<u8>::new("dst", 3);
        assert!(matches!(
            b.then_deep_copy("copy", &dst, &src),
            Err(GraphError::Exec(weft_exec::ExecError::ExtentMismatch { dst: 3, src: 2 }))
        ));
    }

    #[test]
    fn counts_track_construction() {
        let b = builder();
        let a = b.then_kernel("a", || {}).expect("a");
        let c = b.then_kernel("c", || {}).expect("c");
        b.when_all((a, c)).expect("join");
        assert_eq!(b.node_count(), 4);
        assert_eq!(b.edge_count(), 4);
    }
}
