//! Compound queries: bool, dis_max, function_score

use super::{reduce_all, rewrite_all, write_query_array, NodeSlot, QueryExpression};
use crate::compile::SearchQueryCompiler;
use crate::expression::{NamedExpression, Script};
use crate::json::ObjectBuilder;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bool {
    pub filter: Vec<QueryExpression>,
    pub should: Vec<QueryExpression>,
    pub must: Vec<QueryExpression>,
    pub must_not: Vec<QueryExpression>,
    pub minimum_should_match: Option<Value>,
    pub boost: Option<f64>,
}

impl Bool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, query: impl Into<QueryExpression>) -> Self {
        self.filter.push(query.into());
        self
    }

    pub fn should(mut self, query: impl Into<QueryExpression>) -> Self {
        self.should.push(query.into());
        self
    }

    pub fn must(mut self, query: impl Into<QueryExpression>) -> Self {
        self.must.push(query.into());
        self
    }

    pub fn must_not(mut self, query: impl Into<QueryExpression>) -> Self {
        self.must_not.push(query.into());
        self
    }

    pub fn minimum_should_match(mut self, value: impl Into<Value>) -> Self {
        self.minimum_should_match = Some(value.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
            && self.should.is_empty()
            && self.must.is_empty()
            && self.must_not.is_empty()
    }

    pub(crate) fn children(&self) -> Vec<&QueryExpression> {
        self.filter
            .iter()
            .chain(&self.should)
            .chain(&self.must)
            .chain(&self.must_not)
            .collect()
    }

    /// Empty bool reduces to nothing. A lone `should` or lone `must` clause
    /// collapses to that clause; a lone `filter` or `must_not` never does.
    pub fn reduce(&self) -> Option<QueryExpression> {
        let reduced = Bool {
            filter: reduce_all(&self.filter),
            should: reduce_all(&self.should),
            must: reduce_all(&self.must),
            must_not: reduce_all(&self.must_not),
            minimum_should_match: self.minimum_should_match.clone(),
            boost: self.boost,
        };
        if reduced.is_empty() {
            return None;
        }
        let bare = reduced.filter.is_empty()
            && reduced.must_not.is_empty()
            && reduced.minimum_should_match.is_none()
            && reduced.boost.is_none();
        if bare {
            if reduced.should.len() == 1 && reduced.must.is_empty() {
                return reduced.should.into_iter().next();
            }
            if reduced.must.len() == 1 && reduced.should.is_empty() {
                return reduced.must.into_iter().next();
            }
        }
        Some(reduced.into())
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<Bool> {
        let filter = rewrite_all(&self.filter, slot);
        let should = rewrite_all(&self.should, slot);
        let must = rewrite_all(&self.must, slot);
        let must_not = rewrite_all(&self.must_not, slot);
        if filter.is_none() && should.is_none() && must.is_none() && must_not.is_none() {
            return None;
        }
        Some(Bool {
            filter: filter.unwrap_or_else(|| self.filter.clone()),
            should: should.unwrap_or_else(|| self.should.clone()),
            must: must.unwrap_or_else(|| self.must.clone()),
            must_not: must_not.unwrap_or_else(|| self.must_not.clone()),
            minimum_should_match: self.minimum_should_match.clone(),
            boost: self.boost,
        })
    }
}

impl NamedExpression for Bool {
    fn name(&self) -> &str {
        "bool"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field_opt("minimum_should_match", self.minimum_should_match.clone());
        for (name, clauses) in [
            ("filter", &self.filter),
            ("should", &self.should),
            ("must", &self.must),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                write_query_array(obj, name, clauses, compiler);
            }
        }
        obj.field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisMax {
    pub queries: Vec<QueryExpression>,
    pub tie_breaker: Option<f64>,
    pub boost: Option<f64>,
}

impl DisMax {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<QueryExpression>) -> Self {
        self.queries.push(query.into());
        self
    }

    pub fn tie_breaker(mut self, tie_breaker: f64) -> Self {
        self.tie_breaker = Some(tie_breaker);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn reduce(&self) -> Option<QueryExpression> {
        let mut queries = reduce_all(&self.queries);
        match queries.len() {
            0 => None,
            1 => queries.pop(),
            _ => Some(
                DisMax {
                    queries,
                    tie_breaker: self.tie_breaker,
                    boost: self.boost,
                }
                .into(),
            ),
        }
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<DisMax> {
        rewrite_all(&self.queries, slot).map(|queries| DisMax {
            queries,
            tie_breaker: self.tie_breaker,
            boost: self.boost,
        })
    }
}

impl NamedExpression for DisMax {
    fn name(&self) -> &str {
        "dis_max"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        write_query_array(obj, "queries", &self.queries, compiler);
        obj.field_opt("tie_breaker", self.tie_breaker)
            .field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    Multiply,
    Sum,
    Avg,
    First,
    Max,
    Min,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::Multiply => "multiply",
            ScoreMode::Sum => "sum",
            ScoreMode::Avg => "avg",
            ScoreMode::First => "first",
            ScoreMode::Max => "max",
            ScoreMode::Min => "min",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostMode {
    Multiply,
    Replace,
    Sum,
    Avg,
    Max,
    Min,
}

impl BoostMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostMode::Multiply => "multiply",
            BoostMode::Replace => "replace",
            BoostMode::Sum => "sum",
            BoostMode::Avg => "avg",
            BoostMode::Max => "max",
            BoostMode::Min => "min",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    None,
    Log,
    Log1p,
    Log2p,
    Ln,
    Ln1p,
    Ln2p,
    Square,
    Sqrt,
    Reciprocal,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::None => "none",
            Modifier::Log => "log",
            Modifier::Log1p => "log1p",
            Modifier::Log2p => "log2p",
            Modifier::Ln => "ln",
            Modifier::Ln1p => "ln1p",
            Modifier::Ln2p => "ln2p",
            Modifier::Square => "square",
            Modifier::Sqrt => "sqrt",
            Modifier::Reciprocal => "reciprocal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueFactor {
    pub field: String,
    pub factor: Option<f64>,
    pub modifier: Option<Modifier>,
    pub missing: Option<f64>,
}

impl FieldValueFactor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            factor: None,
            modifier: None,
            missing: None,
        }
    }

    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = Some(factor);
        self
    }

    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn missing(mut self, missing: f64) -> Self {
        self.missing = Some(missing);
        self
    }
}

/// Function of a `function_score` query
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    Weight {
        weight: f64,
        filter: Option<QueryExpression>,
    },
    FieldValueFactor {
        factor: FieldValueFactor,
        filter: Option<QueryExpression>,
    },
    ScriptScore {
        script: Script,
        filter: Option<QueryExpression>,
    },
    RandomScore {
        seed: Option<Value>,
        field: Option<String>,
        filter: Option<QueryExpression>,
    },
}

impl ScoreFunction {
    pub fn weight(weight: f64) -> Self {
        ScoreFunction::Weight {
            weight,
            filter: None,
        }
    }

    pub fn field_value_factor(factor: FieldValueFactor) -> Self {
        ScoreFunction::FieldValueFactor {
            factor,
            filter: None,
        }
    }

    pub fn script_score(script: Script) -> Self {
        ScoreFunction::ScriptScore {
            script,
            filter: None,
        }
    }

    pub fn random_score(seed: Option<Value>, field: Option<String>) -> Self {
        ScoreFunction::RandomScore {
            seed,
            field,
            filter: None,
        }
    }

    /// Restricts the function to documents matching `query`
    pub fn filter(mut self, query: impl Into<QueryExpression>) -> Self {
        *self.filter_mut() = Some(query.into());
        self
    }

    pub fn filter_query(&self) -> Option<&QueryExpression> {
        match self {
            ScoreFunction::Weight { filter, .. }
            | ScoreFunction::FieldValueFactor { filter, .. }
            | ScoreFunction::ScriptScore { filter, .. }
            | ScoreFunction::RandomScore { filter, .. } => filter.as_ref(),
        }
    }

    fn filter_mut(&mut self) -> &mut Option<QueryExpression> {
        match self {
            ScoreFunction::Weight { filter, .. }
            | ScoreFunction::FieldValueFactor { filter, .. }
            | ScoreFunction::ScriptScore { filter, .. }
            | ScoreFunction::RandomScore { filter, .. } => filter,
        }
    }

    /// Same function with its filter reduced; an empty filter is dropped
    fn reduce(&self) -> ScoreFunction {
        let mut function = self.clone();
        let reduced = self.filter_query().and_then(QueryExpression::reduce);
        *function.filter_mut() = reduced;
        function
    }

    fn rewrite(&self, slot: &NodeSlot) -> Option<ScoreFunction> {
        let filter = self.filter_query()?;
        let rewritten = filter.rewrite(slot);
        if rewritten.ptr_eq(filter) {
            return None;
        }
        let mut function = self.clone();
        *function.filter_mut() = Some(rewritten);
        Some(function)
    }

    fn write(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        if let Some(filter) = self.filter_query() {
            obj.obj("filter", |f| filter.serialize(f, compiler));
        }
        match self {
            ScoreFunction::Weight { weight, .. } => {
                obj.field("weight", *weight);
            }
            ScoreFunction::FieldValueFactor { factor, .. } => {
                obj.obj("field_value_factor", |f| {
                    f.field("field", factor.field.as_str())
                        .field_opt("factor", factor.factor)
                        .field_opt("modifier", factor.modifier.map(|m| m.as_str()))
                        .field_opt("missing", factor.missing);
                });
            }
            ScoreFunction::ScriptScore { script, .. } => {
                obj.obj("script_score", |s| {
                    s.obj("script", |body| script.write(body));
                });
            }
            ScoreFunction::RandomScore { seed, field, .. } => {
                obj.obj("random_score", |r| {
                    r.field_opt("seed", seed.clone())
                        .field_opt("field", field.as_deref());
                });
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionScore {
    pub query: Option<QueryExpression>,
    pub functions: Vec<ScoreFunction>,
    pub boost: Option<f64>,
    pub score_mode: Option<ScoreMode>,
    pub boost_mode: Option<BoostMode>,
    pub min_score: Option<f64>,
}

impl FunctionScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<QueryExpression>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn function(mut self, function: ScoreFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn score_mode(mut self, score_mode: ScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub fn boost_mode(mut self, boost_mode: BoostMode) -> Self {
        self.boost_mode = Some(boost_mode);
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub(crate) fn children(&self) -> Vec<&QueryExpression> {
        self.query
            .iter()
            .chain(self.functions.iter().filter_map(ScoreFunction::filter_query))
            .collect()
    }

    /// Without functions or `min_score` this is just its inner query
    pub fn reduce(&self) -> Option<QueryExpression> {
        if self.functions.is_empty() && self.min_score.is_none() {
            return self.query.as_ref().and_then(QueryExpression::reduce);
        }
        Some(
            FunctionScore {
                query: self.query.as_ref().and_then(QueryExpression::reduce),
                functions: self.functions.iter().map(ScoreFunction::reduce).collect(),
                ..self.clone()
            }
            .into(),
        )
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> Option<FunctionScore> {
        let query = self.query.as_ref().and_then(|q| {
            let rewritten = q.rewrite(slot);
            (!rewritten.ptr_eq(q)).then_some(rewritten)
        });
        let functions: Vec<Option<ScoreFunction>> =
            self.functions.iter().map(|f| f.rewrite(slot)).collect();
        if query.is_none() && functions.iter().all(Option::is_none) {
            return None;
        }
        Some(FunctionScore {
            query: query.or_else(|| self.query.clone()),
            functions: functions
                .into_iter()
                .zip(&self.functions)
                .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                .collect(),
            ..self.clone()
        })
    }
}

impl NamedExpression for FunctionScore {
    fn name(&self) -> &str {
        "function_score"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        if let Some(query) = &self.query {
            obj.obj("query", |q| query.serialize(q, compiler));
        }
        obj.field_opt("boost", self.boost)
            .field_opt("score_mode", self.score_mode.map(|m| m.as_str()))
            .field_opt("boost_mode", self.boost_mode.map(|m| m.as_str()))
            .field_opt("min_score", self.min_score);
        obj.array("functions", |a| {
            for function in &self.functions {
                a.obj(|f| function.write(f, compiler));
            }
        });
    }
}
