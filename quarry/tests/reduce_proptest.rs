//! Property tests for query reduction

use proptest::prelude::*;
use quarry::compile::SearchQueryCompiler;
use quarry::query::{Bool, DisMax, Exists, FunctionScore, MatchAll, Nested, ScoreFunction, Term};
use quarry::QueryExpression;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn leaf() -> impl Strategy<Value = QueryExpression> {
    prop_oneof![
        ("[a-c]", 0i64..3).prop_map(|(field, value)| QueryExpression::from(Term::new(field, value))),
        "[a-c]".prop_map(|field| QueryExpression::from(Exists::new(field))),
        Just(QueryExpression::from(MatchAll::new())),
    ]
}

fn query() -> impl Strategy<Value = QueryExpression> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..2),
            )
                .prop_map(|(filter, should, must, must_not)| {
                    QueryExpression::from(Bool {
                        filter,
                        should,
                        must,
                        must_not,
                        ..Bool::default()
                    })
                }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|queries| {
                QueryExpression::from(DisMax {
                    queries,
                    ..DisMax::default()
                })
            }),
            (prop::option::of(inner.clone()), 0usize..2).prop_map(|(query, weights)| {
                let mut function_score = FunctionScore::new();
                function_score.query = query;
                for _ in 0..weights {
                    function_score = function_score.function(ScoreFunction::weight(2.0));
                }
                QueryExpression::from(function_score)
            }),
            inner.prop_map(|query| QueryExpression::from(Nested::new("comments", query))),
        ]
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reduce_is_idempotent(q in query()) {
        let once = q.reduce();
        let twice = once.as_ref().and_then(QueryExpression::reduce);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn reduced_query_compiles_to_an_object(q in query()) {
        if let Some(reduced) = q.reduce() {
            let compiled = reduced.to_value(&SearchQueryCompiler::default());
            prop_assert!(compiled.is_object());
            prop_assert_eq!(compiled.as_object().map(|o| o.len()), Some(1));
        }
    }
}
