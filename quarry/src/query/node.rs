//! Node handles: locating and replacing a subtree of an already built query
//!
//! Application code mints a [`NodeHandle`] and places a
//! [`QueryExpressionNode`] carrying it somewhere in a query tree. Later the
//! node can be looked up by handle ([`NodeIndex::find`]), edited, and swapped
//! back in ([`QueryExpression::replace_node`]). Handles compare by identity
//! only; two handles with the same name are distinct.

use super::{Bool, DisMax, FunctionScore, QueryExpression, QueryKind};
use crate::compile::SearchQueryCompiler;
use crate::error::Error;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;
use crate::Result;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token for a replaceable node of type `T`
pub struct NodeHandle<T> {
    id: u64,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NodeHandle<T> {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name.as_ref()),
            _marker: PhantomData,
        }
    }

    /// Display name, not part of the identity
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for NodeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for NodeHandle<T> {}

impl<T> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}#{})", self.name, self.id)
    }
}

/// Value held by a node in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Query(QueryExpression),
    Bool(Bool),
    DisMax(DisMax),
    FunctionScore(FunctionScore),
}

impl NodeValue {
    pub(crate) fn children(&self) -> Vec<&QueryExpression> {
        match self {
            NodeValue::Query(q) => vec![q],
            NodeValue::Bool(q) => q.children(),
            NodeValue::DisMax(q) => q.queries.iter().collect(),
            NodeValue::FunctionScore(q) => q.children(),
        }
    }

    /// The plain (handle-free) query this node stands for
    pub fn to_query(&self) -> QueryExpression {
        match self {
            NodeValue::Query(q) => q.clone(),
            NodeValue::Bool(q) => q.clone().into(),
            NodeValue::DisMax(q) => q.clone().into(),
            NodeValue::FunctionScore(q) => q.clone().into(),
        }
    }

    fn rewrite(&self, slot: &NodeSlot) -> Option<NodeValue> {
        match self {
            NodeValue::Query(q) => {
                let rewritten = q.rewrite(slot);
                (!rewritten.ptr_eq(q)).then_some(NodeValue::Query(rewritten))
            }
            NodeValue::Bool(q) => q.rewrite(slot).map(NodeValue::Bool),
            NodeValue::DisMax(q) => q.rewrite(slot).map(NodeValue::DisMax),
            NodeValue::FunctionScore(q) => q.rewrite(slot).map(NodeValue::FunctionScore),
        }
    }
}

/// Types that can sit behind a node handle
pub trait NodeKind: Clone + fmt::Debug + Send + Sync + 'static {
    fn into_node_value(self) -> NodeValue;

    fn from_node_value(value: &NodeValue) -> Option<&Self>;
}

macro_rules! node_kind {
    ($ty:ident, $variant:ident) => {
        impl NodeKind for $ty {
            fn into_node_value(self) -> NodeValue {
                NodeValue::$variant(self)
            }

            fn from_node_value(value: &NodeValue) -> Option<&Self> {
                match value {
                    NodeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

node_kind!(QueryExpression, Query);
node_kind!(Bool, Bool);
node_kind!(DisMax, DisMax);
node_kind!(FunctionScore, FunctionScore);

/// Type-erased node as stored inside a [`QueryExpression`]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSlot {
    handle_id: u64,
    handle_name: Arc<str>,
    value: NodeValue,
}

impl NodeSlot {
    pub fn new<T: NodeKind>(handle: &NodeHandle<T>, value: T) -> Self {
        Self {
            handle_id: handle.id,
            handle_name: Arc::clone(&handle.name),
            value: value.into_node_value(),
        }
    }

    pub fn handle_name(&self) -> &str {
        &self.handle_name
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn same_handle(&self, other: &NodeSlot) -> bool {
        self.handle_id == other.handle_id
    }

    /// Rewrites a descendant of this node; `None` when nothing below matched
    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<NodeSlot> {
        self.value.rewrite(slot).map(|value| NodeSlot {
            handle_id: self.handle_id,
            handle_name: Arc::clone(&self.handle_name),
            value,
        })
    }
}

impl NamedExpression for NodeSlot {
    fn name(&self) -> &str {
        match &self.value {
            NodeValue::Query(q) => q.name(),
            NodeValue::Bool(q) => q.name(),
            NodeValue::DisMax(q) => q.name(),
            NodeValue::FunctionScore(q) => q.name(),
        }
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        match &self.value {
            NodeValue::Query(q) => q.body(obj, compiler),
            NodeValue::Bool(q) => q.body(obj, compiler),
            NodeValue::DisMax(q) => q.body(obj, compiler),
            NodeValue::FunctionScore(q) => q.body(obj, compiler),
        }
    }
}

/// A located, replaceable query node
#[derive(Debug, Clone)]
pub struct QueryExpressionNode<T: NodeKind> {
    handle: NodeHandle<T>,
    value: T,
}

pub type BoolNode = QueryExpressionNode<Bool>;
pub type DisMaxNode = QueryExpressionNode<DisMax>;
pub type FunctionScoreNode = QueryExpressionNode<FunctionScore>;

impl<T: NodeKind> QueryExpressionNode<T> {
    pub fn new(handle: &NodeHandle<T>, value: T) -> Self {
        Self {
            handle: handle.clone(),
            value,
        }
    }

    pub fn handle(&self) -> &NodeHandle<T> {
        &self.handle
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Swaps in a new value, returning the previous one
    pub fn replace(&mut self, value: T) -> T {
        std::mem::replace(&mut self.value, value)
    }

    pub fn map(self, f: impl FnOnce(T) -> T) -> Self {
        Self {
            value: f(self.value),
            handle: self.handle,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn to_slot(&self) -> NodeSlot {
        NodeSlot::new(&self.handle, self.value.clone())
    }
}

impl<T: NodeKind> From<QueryExpressionNode<T>> for QueryExpression {
    fn from(node: QueryExpressionNode<T>) -> Self {
        QueryExpression::new(QueryKind::Node(NodeSlot::new(&node.handle, node.value)))
    }
}

/// Handle to node map of one or more query trees
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    slots: HashMap<u64, NodeSlot>,
}

impl NodeIndex {
    /// Pre-order walk over every root. Fails on the second occurrence of a
    /// handle.
    pub fn collect<'a>(roots: impl IntoIterator<Item = &'a QueryExpression>) -> Result<Self> {
        let mut slots = HashMap::new();
        let mut stack: Vec<&QueryExpression> = roots.into_iter().collect();
        stack.reverse();

        while let Some(query) = stack.pop() {
            if let QueryKind::Node(slot) = query.kind() {
                if slots.insert(slot.handle_id, slot.clone()).is_some() {
                    return Err(Error::DuplicateHandle(slot.handle_name().to_string()));
                }
            }
            let children = query.children();
            stack.extend(children.into_iter().rev());
        }

        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains<T>(&self, handle: &NodeHandle<T>) -> bool {
        self.slots.contains_key(&handle.id)
    }

    pub fn find<T: NodeKind>(&self, handle: &NodeHandle<T>) -> Result<QueryExpressionNode<T>> {
        self.slots
            .get(&handle.id)
            .and_then(|slot| T::from_node_value(slot.value()))
            .map(|value| QueryExpressionNode::new(handle, value.clone()))
            .ok_or_else(|| Error::HandleNotFound(handle.name().to_string()))
    }
}

impl QueryExpression {
    /// Looks up the node behind `handle` in this tree
    pub fn find_node<T: NodeKind>(&self, handle: &NodeHandle<T>) -> Result<QueryExpressionNode<T>> {
        NodeIndex::collect([self])?.find(handle)
    }

    /// Returns a tree where the node carrying `node`'s handle holds the new
    /// value. Unchanged subtrees are shared with `self`.
    pub fn replace_node<T: NodeKind>(&self, node: &QueryExpressionNode<T>) -> Result<QueryExpression> {
        let index = NodeIndex::collect([self])?;
        if !index.contains(node.handle()) {
            return Err(Error::HandleNotFound(node.handle().name().to_string()));
        }
        Ok(self.rewrite(&node.to_slot()))
    }
}
