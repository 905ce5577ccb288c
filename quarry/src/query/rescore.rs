//! Query rescorer

use super::{NodeSlot, QueryExpression};
use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::ObjectBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescoreScoreMode {
    Total,
    Multiply,
    Avg,
    Max,
    Min,
}

impl RescoreScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescoreScoreMode::Total => "total",
            RescoreScoreMode::Multiply => "multiply",
            RescoreScoreMode::Avg => "avg",
            RescoreScoreMode::Max => "max",
            RescoreScoreMode::Min => "min",
        }
    }
}

/// Re-ranks the top `window_size` hits with a second query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRescore {
    pub query: QueryExpression,
    pub window_size: Option<u32>,
    pub query_weight: Option<f64>,
    pub rescore_query_weight: Option<f64>,
    pub score_mode: Option<RescoreScoreMode>,
}

impl QueryRescore {
    pub fn new(query: impl Into<QueryExpression>) -> Self {
        Self {
            query: query.into(),
            window_size: None,
            query_weight: None,
            rescore_query_weight: None,
            score_mode: None,
        }
    }

    pub fn window_size(mut self, window_size: u32) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn query_weight(mut self, weight: f64) -> Self {
        self.query_weight = Some(weight);
        self
    }

    pub fn rescore_query_weight(mut self, weight: f64) -> Self {
        self.rescore_query_weight = Some(weight);
        self
    }

    pub fn score_mode(mut self, score_mode: RescoreScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub(crate) fn rewrite(&self, slot: &NodeSlot) -> QueryRescore {
        QueryRescore {
            query: self.query.rewrite(slot),
            ..self.clone()
        }
    }

    /// Writes one entry of the `rescore` array. A rescore query that reduces
    /// away is written as `match_all`.
    pub fn write(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        let query = self
            .query
            .reduce()
            .unwrap_or_else(|| super::MatchAll::new().into());
        obj.field_opt("window_size", self.window_size);
        obj.obj("query", |q| {
            q.obj("rescore_query", |rq| query.serialize(rq, compiler));
            q.field_opt("query_weight", self.query_weight)
                .field_opt("rescore_query_weight", self.rescore_query_weight)
                .field_opt("score_mode", self.score_mode.map(|m| m.as_str()));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MatchPhrase;
    use serde_json::json;

    #[test]
    fn test_rescore_body() {
        let rescore = QueryRescore::new(MatchPhrase::new("title", "rust book").slop(2))
            .window_size(50)
            .query_weight(0.7)
            .rescore_query_weight(1.2)
            .score_mode(RescoreScoreMode::Total);

        let mut obj = ObjectBuilder::new();
        rescore.write(&mut obj, &SearchQueryCompiler::default());
        assert_eq!(
            obj.into_value(),
            json!({
                "window_size": 50,
                "query": {
                    "rescore_query": {"match_phrase": {"title": {"query": "rust book", "slop": 2}}},
                    "query_weight": 0.7,
                    "rescore_query_weight": 1.2,
                    "score_mode": "total"
                }
            })
        );
    }
}
