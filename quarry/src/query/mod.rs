//! Query expression library
//!
//! Every query is a [`QueryExpression`]: a cheaply clonable, structurally
//! shared handle over one [`QueryKind`] variant. Composite variants hold
//! their children as `QueryExpression`s, so rebuilding a parent after a
//! child changed copies only the path from the root to that child.
//!
//! Supported query types:
//! - `bool`, `dis_max`, `function_score`
//! - `term` / `terms` / `ids` / `exists` / `range` / `prefix` / `wildcard`
//! - `match` / `match_phrase` / `match_all` / `multi_match`
//! - `nested` / `has_child` / `has_parent`

mod compound;
mod full_text;
mod joining;
mod node;
mod rescore;
mod sort;
mod source;
mod term_level;

pub use compound::{Bool, BoostMode, DisMax, FieldValueFactor, FunctionScore, Modifier, ScoreFunction, ScoreMode};
pub use full_text::{Match, MatchPhrase, MultiMatch, MultiMatchType, Operator};
pub use joining::{HasChild, HasParent, Nested, NestedScoreMode};
pub use node::{
    BoolNode, DisMaxNode, FunctionScoreNode, NodeHandle, NodeIndex, NodeKind, NodeSlot, NodeValue,
    QueryExpressionNode,
};
pub use rescore::{QueryRescore, RescoreScoreMode};
pub use sort::{Missing, NestedSort, Order, Sort, SortMode, SortTarget};
pub use source::SourceFilter;
pub use term_level::{Exists, Ids, MatchAll, Prefix, Range, RangeRelation, Term, Terms, Wildcard};

use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;
use crate::types::{Field, FieldType};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Closed set of query variants
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    MatchAll(MatchAll),
    Term(Term),
    Terms(Terms),
    Ids(Ids),
    Exists(Exists),
    Range(Range),
    Prefix(Prefix),
    Wildcard(Wildcard),
    Match(Match),
    MatchPhrase(MatchPhrase),
    MultiMatch(MultiMatch),
    Bool(Bool),
    DisMax(DisMax),
    FunctionScore(FunctionScore),
    Nested(Nested),
    HasChild(HasChild),
    HasParent(HasParent),
    Node(NodeSlot),
    Raw(RawQuery),
}

/// Query that is not modelled by a dedicated variant
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub name: String,
    pub body: Map<String, Value>,
}

/// A query node placed in `query`, `filter`, `post_filter` and friends
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression(Arc<QueryKind>);

macro_rules! dispatch {
    ($kind:expr, $q:ident => $body:expr) => {
        match $kind {
            QueryKind::MatchAll($q) => $body,
            QueryKind::Term($q) => $body,
            QueryKind::Terms($q) => $body,
            QueryKind::Ids($q) => $body,
            QueryKind::Exists($q) => $body,
            QueryKind::Range($q) => $body,
            QueryKind::Prefix($q) => $body,
            QueryKind::Wildcard($q) => $body,
            QueryKind::Match($q) => $body,
            QueryKind::MatchPhrase($q) => $body,
            QueryKind::MultiMatch($q) => $body,
            QueryKind::Bool($q) => $body,
            QueryKind::DisMax($q) => $body,
            QueryKind::FunctionScore($q) => $body,
            QueryKind::Nested($q) => $body,
            QueryKind::HasChild($q) => $body,
            QueryKind::HasParent($q) => $body,
            QueryKind::Node($q) => $body,
            QueryKind::Raw($q) => $body,
        }
    };
}

impl QueryExpression {
    pub fn new(kind: QueryKind) -> Self {
        Self(Arc::new(kind))
    }

    /// Query written verbatim as `{"<name>": <body>}`
    pub fn raw(name: impl Into<String>, body: Map<String, Value>) -> Self {
        Self::new(QueryKind::Raw(RawQuery {
            name: name.into(),
            body,
        }))
    }

    pub fn kind(&self) -> &QueryKind {
        &self.0
    }

    /// Identity comparison, as opposed to the structural `==`
    pub fn ptr_eq(&self, other: &QueryExpression) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Direct child queries, used by node collection
    pub fn children(&self) -> Vec<&QueryExpression> {
        match self.kind() {
            QueryKind::Bool(q) => q.children(),
            QueryKind::DisMax(q) => q.queries.iter().collect(),
            QueryKind::FunctionScore(q) => q.children(),
            QueryKind::Nested(q) => vec![&q.query],
            QueryKind::HasChild(q) => vec![&q.query],
            QueryKind::HasParent(q) => vec![&q.query],
            QueryKind::Node(q) => q.value().children(),
            _ => Vec::new(),
        }
    }

    /// Simplest equivalent form, `None` when the query matches without
    /// constraint. Children are reduced before the node's own rule applies.
    pub fn reduce(&self) -> Option<QueryExpression> {
        match self.kind() {
            QueryKind::Bool(q) => q.reduce(),
            QueryKind::DisMax(q) => q.reduce(),
            QueryKind::FunctionScore(q) => q.reduce(),
            QueryKind::Nested(q) => Some(q.reduce().into()),
            QueryKind::HasChild(q) => Some(q.reduce().into()),
            QueryKind::HasParent(q) => Some(q.reduce().into()),
            QueryKind::Node(q) => q.value().to_query().reduce(),
            _ => Some(self.clone()),
        }
    }

    /// Replaces the node carrying `slot`'s handle. Returns `self` (same
    /// identity) when no descendant matched.
    pub fn rewrite(&self, slot: &NodeSlot) -> QueryExpression {
        let rewritten = match self.kind() {
            QueryKind::Node(node) if node.same_handle(slot) => {
                return QueryExpression::new(QueryKind::Node(slot.clone()));
            }
            QueryKind::Node(node) => node.rewrite(slot).map(QueryKind::Node),
            QueryKind::Bool(q) => q.rewrite(slot).map(QueryKind::Bool),
            QueryKind::DisMax(q) => q.rewrite(slot).map(QueryKind::DisMax),
            QueryKind::FunctionScore(q) => q.rewrite(slot).map(QueryKind::FunctionScore),
            QueryKind::Nested(q) => q.rewrite(slot).map(QueryKind::Nested),
            QueryKind::HasChild(q) => q.rewrite(slot).map(QueryKind::HasChild),
            QueryKind::HasParent(q) => q.rewrite(slot).map(QueryKind::HasParent),
            _ => None,
        };
        match rewritten {
            Some(kind) => QueryExpression::new(kind),
            None => self.clone(),
        }
    }

    /// Compiles to `{"<name>": {...}}`
    pub fn to_value(&self, compiler: &SearchQueryCompiler) -> Value {
        let mut obj = ObjectBuilder::new();
        self.serialize(&mut obj, compiler);
        obj.into_value()
    }
}

impl NamedExpression for QueryExpression {
    fn name(&self) -> &str {
        dispatch!(self.kind(), q => q.name())
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        dispatch!(self.kind(), q => q.body(obj, compiler))
    }
}

impl NamedExpression for RawQuery {
    fn name(&self) -> &str {
        &self.name
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        for (key, value) in &self.body {
            obj.field(key.as_str(), value.clone());
        }
    }
}

/// Rewrites each query of a list, `None` when no element changed identity
pub(crate) fn rewrite_all(queries: &[QueryExpression], slot: &NodeSlot) -> Option<Vec<QueryExpression>> {
    let rewritten: Vec<QueryExpression> = queries.iter().map(|q| q.rewrite(slot)).collect();
    let changed = rewritten
        .iter()
        .zip(queries)
        .any(|(new, old)| !new.ptr_eq(old));
    changed.then_some(rewritten)
}

pub(crate) fn reduce_all(queries: &[QueryExpression]) -> Vec<QueryExpression> {
    queries.iter().filter_map(QueryExpression::reduce).collect()
}

pub(crate) fn write_query_array(
    obj: &mut ObjectBuilder,
    name: &str,
    queries: &[QueryExpression],
    compiler: &SearchQueryCompiler,
) {
    obj.array(name, |a| {
        for query in queries {
            a.obj(|q| query.serialize(q, compiler));
        }
    });
}

macro_rules! into_query {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for QueryExpression {
                fn from(query: $variant) -> Self {
                    QueryExpression::new(QueryKind::$variant(query))
                }
            }
        )*
    };
}

into_query!(
    MatchAll, Term, Terms, Ids, Exists, Range, Prefix, Wildcard, Match, MatchPhrase, MultiMatch,
    Bool, DisMax, FunctionScore, Nested, HasChild, HasParent,
);

/// Convenience constructors over the query variants
impl<T: FieldType> Field<T> {
    /// `term` query; `eq(None)` matches documents without a value
    pub fn eq(&self, value: impl Into<Option<T::Value>>) -> QueryExpression {
        match value.into() {
            Some(value) => Term::new(self.name(), self.serialize_term(&value)).into(),
            None => Bool::new().must_not(Exists::new(self.name())).into(),
        }
    }

    /// Negated `term` query; `ne(None)` matches documents with any value
    pub fn ne(&self, value: impl Into<Option<T::Value>>) -> QueryExpression {
        match value.into() {
            Some(value) => Bool::new()
                .must_not(Term::new(self.name(), self.serialize_term(&value)))
                .into(),
            None => Exists::new(self.name()).into(),
        }
    }

    pub fn one_of(&self, values: impl IntoIterator<Item = T::Value>) -> QueryExpression {
        let terms = values
            .into_iter()
            .map(|value| self.serialize_term(&value))
            .collect();
        Terms::new(self.name(), terms).into()
    }

    pub fn gt(&self, value: T::Value) -> QueryExpression {
        Range::new(self.name()).gt(self.serialize_term(&value)).into()
    }

    pub fn gte(&self, value: T::Value) -> QueryExpression {
        Range::new(self.name()).gte(self.serialize_term(&value)).into()
    }

    pub fn lt(&self, value: T::Value) -> QueryExpression {
        Range::new(self.name()).lt(self.serialize_term(&value)).into()
    }

    pub fn lte(&self, value: T::Value) -> QueryExpression {
        Range::new(self.name()).lte(self.serialize_term(&value)).into()
    }

    /// Half-open `[from, to)` range, either bound optional
    pub fn between(&self, from: Option<T::Value>, to: Option<T::Value>) -> QueryExpression {
        let mut range = Range::new(self.name());
        if let Some(from) = from {
            range = range.gte(self.serialize_term(&from));
        }
        if let Some(to) = to {
            range = range.lt(self.serialize_term(&to));
        }
        range.into()
    }

    pub fn exists(&self) -> QueryExpression {
        Exists::new(self.name()).into()
    }

    pub fn match_(&self, text: impl Into<String>) -> Match {
        Match::new(self.name(), text)
    }

    pub fn match_phrase(&self, text: impl Into<String>) -> MatchPhrase {
        MatchPhrase::new(self.name(), text)
    }

    pub fn prefix(&self, value: impl Into<String>) -> Prefix {
        Prefix::new(self.name(), value)
    }

    pub fn sort(&self) -> Sort {
        Sort::field(self.name())
    }

    pub fn asc(&self) -> Sort {
        Sort::field(self.name()).order(Order::Asc)
    }

    pub fn desc(&self) -> Sort {
        Sort::field(self.name()).order(Order::Desc)
    }
}
