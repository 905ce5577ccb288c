//! Term-level queries: exact values, ranges, existence

use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchAll {
    pub boost: Option<f64>,
}

impl MatchAll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for MatchAll {
    fn name(&self) -> &str {
        "match_all"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub field: String,
    pub term: Value,
    pub boost: Option<f64>,
}

impl Term {
    pub fn new(field: impl Into<String>, term: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
            boost: None,
        }
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Term {
    fn name(&self) -> &str {
        "term"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        match self.boost {
            None => {
                obj.field(self.field.as_str(), self.term.clone());
            }
            Some(boost) => {
                obj.obj(self.field.as_str(), |t| {
                    t.field("value", self.term.clone()).field("boost", boost);
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Terms {
    pub field: String,
    pub terms: Vec<Value>,
    pub boost: Option<f64>,
}

impl Terms {
    pub fn new(field: impl Into<String>, terms: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            terms,
            boost: None,
        }
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Terms {
    fn name(&self) -> &str {
        "terms"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field(self.field.as_str(), Value::Array(self.terms.clone()));
        obj.field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ids {
    pub values: Vec<String>,
    pub boost: Option<f64>,
}

impl Ids {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            boost: None,
        }
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Ids {
    fn name(&self) -> &str {
        "ids"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.array("values", |a| {
            for id in &self.values {
                a.value(id.as_str());
            }
        });
        obj.field_opt("boost", self.boost);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exists {
    pub field: String,
    pub boost: Option<f64>,
}

impl Exists {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            boost: None,
        }
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Exists {
    fn name(&self) -> &str {
        "exists"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field("field", self.field.as_str());
        obj.field_opt("boost", self.boost);
    }
}

/// Range relation for range fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRelation {
    Intersects,
    Contains,
    Within,
}

impl RangeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeRelation::Intersects => "INTERSECTS",
            RangeRelation::Contains => "CONTAINS",
            RangeRelation::Within => "WITHIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub field: String,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
    pub relation: Option<RangeRelation>,
    pub boost: Option<f64>,
}

impl Range {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            relation: None,
            boost: None,
        }
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn relation(mut self, relation: RangeRelation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Range {
    fn name(&self) -> &str {
        "range"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.obj(self.field.as_str(), |r| {
            r.field_opt("gt", self.gt.clone())
                .field_opt("gte", self.gte.clone())
                .field_opt("lt", self.lt.clone())
                .field_opt("lte", self.lte.clone())
                .field_opt("relation", self.relation.map(|rel| rel.as_str()))
                .field_opt("boost", self.boost);
        });
    }
}

/// Prefix query; the bare form is used when no boost is set
#[derive(Debug, Clone, PartialEq)]
pub struct Prefix {
    pub field: String,
    pub value: String,
    pub boost: Option<f64>,
}

impl Prefix {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            boost: None,
        }
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Prefix {
    fn name(&self) -> &str {
        "prefix"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        match self.boost {
            None => {
                obj.field(self.field.as_str(), self.value.as_str());
            }
            Some(boost) => {
                obj.obj(self.field.as_str(), |p| {
                    p.field("value", self.value.as_str()).field("boost", boost);
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wildcard {
    pub field: String,
    pub value: String,
    pub case_insensitive: Option<bool>,
    pub boost: Option<f64>,
}

impl Wildcard {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            case_insensitive: None,
            boost: None,
        }
    }

    pub fn case_insensitive(mut self, value: bool) -> Self {
        self.case_insensitive = Some(value);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for Wildcard {
    fn name(&self) -> &str {
        "wildcard"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        if self.case_insensitive.is_none() && self.boost.is_none() {
            obj.field(self.field.as_str(), self.value.as_str());
            return;
        }
        obj.obj(self.field.as_str(), |w| {
            w.field("value", self.value.as_str())
                .field_opt("case_insensitive", self.case_insensitive)
                .field_opt("boost", self.boost);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(expr: &impl NamedExpression) -> Value {
        let compiler = SearchQueryCompiler::default();
        let mut obj = ObjectBuilder::new();
        expr.serialize(&mut obj, &compiler);
        obj.into_value()
    }

    #[test]
    fn test_term_short_and_long_form() {
        assert_eq!(
            compile(&Term::new("status", 0)),
            json!({"term": {"status": 0}})
        );
        assert_eq!(
            compile(&Term::new("status", 0).boost(2.0)),
            json!({"term": {"status": {"value": 0, "boost": 2.0}}})
        );
    }

    #[test]
    fn test_terms_with_boost() {
        let terms = Terms::new("tag", vec![json!("a"), json!("b")]).boost(1.5);
        assert_eq!(
            compile(&terms),
            json!({"terms": {"tag": ["a", "b"], "boost": 1.5}})
        );
    }

    #[test]
    fn test_range_omits_absent_bounds() {
        let range = Range::new("rank").gte(90.0).lt(100.0);
        let text = serde_json::to_string(&compile(&range)).unwrap();
        assert_eq!(text, r#"{"range":{"rank":{"gte":90.0,"lt":100.0}}}"#);
    }

    #[test]
    fn test_range_relation() {
        let range = Range::new("period").gte("2024-01-01").relation(RangeRelation::Within);
        assert_eq!(
            compile(&range),
            json!({"range": {"period": {"gte": "2024-01-01", "relation": "WITHIN"}}})
        );
    }

    #[test]
    fn test_exists_and_ids() {
        assert_eq!(
            compile(&Exists::new("author.name")),
            json!({"exists": {"field": "author.name"}})
        );
        assert_eq!(
            compile(&Ids::new(["1", "2"]).boost(3.0)),
            json!({"ids": {"values": ["1", "2"], "boost": 3.0}})
        );
    }

    #[test]
    fn test_match_all() {
        assert_eq!(compile(&MatchAll::new()), json!({"match_all": {}}));
    }

    #[test]
    fn test_prefix_and_wildcard_forms() {
        assert_eq!(
            compile(&Prefix::new("name", "joh")),
            json!({"prefix": {"name": "joh"}})
        );
        assert_eq!(
            compile(&Wildcard::new("user", "ki*y").case_insensitive(true)),
            json!({"wildcard": {"user": {"value": "ki*y", "case_insensitive": true}}})
        );
    }
}
