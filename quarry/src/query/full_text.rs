//! Full-text queries

use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

/// `match` query. Serializes as `{"<field>": "<text>"}` until an option is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub field: String,
    pub query: String,
    pub analyzer: Option<String>,
    pub operator: Option<Operator>,
    pub minimum_should_match: Option<Value>,
    pub fuzziness: Option<String>,
    pub boost: Option<f64>,
}

impl Match {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            analyzer: None,
            operator: None,
            minimum_should_match: None,
            fuzziness: None,
            boost: None,
        }
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn minimum_should_match(mut self, value: impl Into<Value>) -> Self {
        self.minimum_should_match = Some(value.into());
        self
    }

    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    fn has_options(&self) -> bool {
        self.analyzer.is_some()
            || self.operator.is_some()
            || self.minimum_should_match.is_some()
            || self.fuzziness.is_some()
            || self.boost.is_some()
    }
}

impl NamedExpression for Match {
    fn name(&self) -> &str {
        "match"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        if !self.has_options() {
            obj.field(self.field.as_str(), self.query.as_str());
            return;
        }
        obj.obj(self.field.as_str(), |m| {
            m.field("query", self.query.as_str())
                .field_opt("analyzer", self.analyzer.as_deref())
                .field_opt("operator", self.operator.map(|op| op.as_str()))
                .field_opt("minimum_should_match", self.minimum_should_match.clone())
                .field_opt("fuzziness", self.fuzziness.as_deref())
                .field_opt("boost", self.boost);
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchPhrase {
    pub field: String,
    pub query: String,
    pub slop: Option<u32>,
    pub analyzer: Option<String>,
    pub boost: Option<f64>,
}

impl MatchPhrase {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            slop: None,
            analyzer: None,
            boost: None,
        }
    }

    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = Some(slop);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl NamedExpression for MatchPhrase {
    fn name(&self) -> &str {
        "match_phrase"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        if self.slop.is_none() && self.analyzer.is_none() && self.boost.is_none() {
            obj.field(self.field.as_str(), self.query.as_str());
            return;
        }
        obj.obj(self.field.as_str(), |m| {
            m.field("query", self.query.as_str())
                .field_opt("slop", self.slop)
                .field_opt("analyzer", self.analyzer.as_deref())
                .field_opt("boost", self.boost);
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMatchType {
    BestFields,
    MostFields,
    CrossFields,
    Phrase,
    PhrasePrefix,
    BoolPrefix,
}

impl MultiMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiMatchType::BestFields => "best_fields",
            MultiMatchType::MostFields => "most_fields",
            MultiMatchType::CrossFields => "cross_fields",
            MultiMatchType::Phrase => "phrase",
            MultiMatchType::PhrasePrefix => "phrase_prefix",
            MultiMatchType::BoolPrefix => "bool_prefix",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatch {
    pub query: String,
    pub fields: Vec<String>,
    pub match_type: Option<MultiMatchType>,
    pub operator: Option<Operator>,
    pub minimum_should_match: Option<Value>,
    pub tie_breaker: Option<f64>,
    pub boost: Option<f64>,
}

impl MultiMatch {
    pub fn new<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            match_type: None,
            operator: None,
            minimum_should_match: None,
            tie_breaker: None,
            boost: None,
        }
    }

    pub fn match_type(mut self, match_type: MultiMatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn minimum_should_match(mut self, value: impl Into<Value>) -> Self {
        self.minimum_should_match = Some(value.into());
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
}

impl NamedExpression for MultiMatch {
    fn name(&self) -> &str {
        "multi_match"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field("query", self.query.as_str());
        obj.array("fields", |a| {
            for field in &self.fields {
                a.value(field.as_str());
            }
        });
        obj.field_opt("type", self.match_type.map(|t| t.as_str()))
            .field_opt("operator", self.operator.map(|op| op.as_str()))
            .field_opt("minimum_should_match", self.minimum_should_match.clone())
            .field_opt("tie_breaker", self.tie_breaker)
            .field_opt("boost", self.boost);
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
    fn test_match_bare_form_without_options() {
        assert_eq!(
            compile(&Match::new("title", "quick fox")),
            json!({"match": {"title": "quick fox"}})
        );
    }

    #[test]
    fn test_match_long_form_with_any_option() {
        assert_eq!(
            compile(&Match::new("title", "quick fox").operator(Operator::And)),
            json!({"match": {"title": {"query": "quick fox", "operator": "and"}}})
        );
        assert_eq!(
            compile(&Match::new("title", "quick fox").minimum_should_match("75%")),
            json!({"match": {"title": {"query": "quick fox", "minimum_should_match": "75%"}}})
        );
    }

    #[test]
    fn test_match_phrase_forms() {
        assert_eq!(
            compile(&MatchPhrase::new("body", "to be or not")),
            json!({"match_phrase": {"body": "to be or not"}})
        );
        assert_eq!(
            compile(&MatchPhrase::new("body", "to be or not").slop(2)),
            json!({"match_phrase": {"body": {"query": "to be or not", "slop": 2}}})
        );
    }

    #[test]
    fn test_multi_match() {
        let mm = MultiMatch::new("rust search", ["title^2", "body"])
            .match_type(MultiMatchType::CrossFields)
            .operator(Operator::And);
        assert_eq!(
            compile(&mm),
            json!({"multi_match": {
                "query": "rust search",
                "fields": ["title^2", "body"],
                "type": "cross_fields",
                "operator": "and"
            }})
        );
    }
}
