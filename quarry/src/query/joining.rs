//! Joining queries: nested documents and parent/child relations

use super::{MatchAll, NodeSlot, QueryExpression};
use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedScoreMode {
    Avg,
    Max,
    Min,
    None,
    Sum,
}

impl NestedScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NestedScoreMode::Avg => "avg",
            NestedScoreMode::Max => "max",
            NestedScoreMode::Min => "min",
            NestedScoreMode::None => "none",
            NestedScoreMode::Sum => "sum",
        }
    }
}

/// Inner query reduced, or `match_all` when it reduced away
fn reduce_inner(query: &QueryExpression) -> QueryExpression {
    query.reduce().unwrap_or_else(|| MatchAll::new().into())
}

fn rewrite_inner(query: &QueryExpression, slot: &NodeSlot) -> Option<QueryExpression> {
    let rewritten = query.rewrite(slot);
    (!rewritten.ptr_eq(query)).then_some(rewritten)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nested {
    pub path: String,
    pub query: QueryExpression,
    pub score_mode: Option<NestedScoreMode>,
    pub ignore_unmapped: Option<bool>,
    pub boost: Option<f64>,
}

impl Nested {
    pub fn new(path: impl Into<String>, query: impl Into<QueryExpression>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            score_mode: None,
            ignore_unmapped: None,
            boost: None,
        }
    }

    pub fn score_mode(mut self, score_mode: NestedScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub fn ignore_unmapped(mut self, ignore_unmapped: bool) -> Self {
        self.ignore_unmapped = Some(ignore_unmapped);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn reduce(&self) -> Nested {
        Nested {
            query: reduce_inner(&self.query),
            ..self.clone()
        }
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<Nested> {
        rewrite_inner(&self.query, slot).map(|query| Nested {
            query,
            ..self.clone()
        })
    }
}

impl NamedExpression for Nested {
    fn name(&self) -> &str {
        "nested"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field("path", self.path.as_str());
        obj.obj("query", |q| self.query.serialize(q, compiler));
        obj.field_opt("score_mode", self.score_mode.map(|m| m.as_str()))
            .field_opt("ignore_unmapped", self.ignore_unmapped)
            .field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HasChild {
    pub child_type: String,
    pub query: QueryExpression,
    pub score_mode: Option<NestedScoreMode>,
    pub min_children: Option<u32>,
    pub max_children: Option<u32>,
    pub boost: Option<f64>,
}

impl HasChild {
    pub fn new(child_type: impl Into<String>, query: impl Into<QueryExpression>) -> Self {
        Self {
            child_type: child_type.into(),
            query: query.into(),
            score_mode: None,
            min_children: None,
            max_children: None,
            boost: None,
        }
    }

    pub fn score_mode(mut self, score_mode: NestedScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub fn min_children(mut self, min_children: u32) -> Self {
        self.min_children = Some(min_children);
        self
    }

    pub fn max_children(mut self, max_children: u32) -> Self {
        self.max_children = Some(max_children);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn reduce(&self) -> HasChild {
        HasChild {
            query: reduce_inner(&self.query),
            ..self.clone()
        }
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<HasChild> {
        rewrite_inner(&self.query, slot).map(|query| HasChild {
            query,
            ..self.clone()
        })
    }
}

impl NamedExpression for HasChild {
    fn name(&self) -> &str {
        "has_child"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field("type", self.child_type.as_str());
        obj.obj("query", |q| self.query.serialize(q, compiler));
        obj.field_opt("score_mode", self.score_mode.map(|m| m.as_str()))
            .field_opt("min_children", self.min_children)
            .field_opt("max_children", self.max_children)
            .field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HasParent {
    pub parent_type: String,
    pub query: QueryExpression,
    pub score: Option<bool>,
    pub boost: Option<f64>,
}

impl HasParent {
    pub fn new(parent_type: impl Into<String>, query: impl Into<QueryExpression>) -> Self {
        Self {
            parent_type: parent_type.into(),
            query: query.into(),
            score: None,
            boost: None,
        }
    }

    pub fn score(mut self, score: bool) -> Self {
        self.score = Some(score);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn reduce(&self) -> HasParent {
        HasParent {
            query: reduce_inner(&self.query),
            ..self.clone()
        }
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<HasParent> {
        rewrite_inner(&self.query, slot).map(|query| HasParent {
            query,
            ..self.clone()
        })
    }
}

impl NamedExpression for HasParent {
    fn name(&self) -> &str {
        "has_parent"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field("parent_type", self.parent_type.as_str());
        obj.obj("query", |q| self.query.serialize(q, compiler));
        obj.field_opt("score", self.score)
            .field_opt("boost", self.boost);
    }
}
