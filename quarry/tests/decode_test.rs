//! Response decoding: aggregations, hits and bulk items

use quarry::aggs::{AggRange, AggValue, Aggregation, RangeAgg, StatsAgg, TermsAgg};
use quarry::bulk::{BulkItemResult, BulkOpType, BulkResult};
use quarry::compile::SearchQueryCompiler;
use quarry::json::ObjectReader;
use quarry::types::{Double, Field, IntEnum, IntEnumType};
use quarry::{Error, SearchQuery};
use serde_json::{json, Value};

fn reader(value: &Value) -> ObjectReader<'_> {
    ObjectReader::from_value(value).unwrap()
}

// ---------------------------------------------------------------------------
// Range dual shape
// ---------------------------------------------------------------------------

#[test]
fn test_range_array_and_object_shapes_agree() {
    let price = Field::new("price", Double);
    let unnamed = RangeAgg::new(AggValue::field(&price))
        .range(AggRange::new(None, Some(50.0)))
        .range(AggRange::new(Some(50.0), Some(100.0)))
        .range(AggRange::new(Some(100.0), None));
    let named = RangeAgg::new(AggValue::field(&price))
        .range(AggRange::keyed("cheap", None, Some(50.0)))
        .range(AggRange::keyed("mid", Some(50.0), Some(100.0)))
        .range(AggRange::keyed("expensive", Some(100.0), None))
        .keyed(true);

    let array = json!({"buckets": [
        {"key": "*-50.0", "to": 50.0, "doc_count": 2},
        {"key": "50.0-100.0", "from": 50.0, "to": 100.0, "doc_count": 4},
        {"key": "100.0-*", "from": 100.0, "doc_count": 1}
    ]});
    let object = json!({"buckets": {
        "cheap": {"to": 50.0, "doc_count": 2},
        "mid": {"from": 50.0, "to": 100.0, "doc_count": 4},
        "expensive": {"from": 100.0, "doc_count": 1}
    }});

    let from_array = unnamed.decode(&reader(&array)).unwrap();
    let from_object = named.decode(&reader(&object)).unwrap();

    let shape = |r: &quarry::aggs::RangeResult| {
        r.buckets
            .iter()
            .map(|b| (b.from, b.to, b.doc_count))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&from_array), shape(&from_object));
    assert_eq!(from_object.get("mid").map(|b| b.doc_count), Some(4));
}

// ---------------------------------------------------------------------------
// Metric and typed keys
// ---------------------------------------------------------------------------

#[test]
fn test_stats_requires_sum() {
    let rank = Field::new("rank", Double);
    let stats = StatsAgg::new(AggValue::field(&rank));

    let empty = json!({"count": 0, "min": null, "max": null, "avg": null, "sum": 0.0});
    let result = stats.decode(&reader(&empty)).unwrap();
    assert_eq!(result.count, 0);
    assert_eq!(result.min, None);

    let missing = json!({"count": 3, "min": 1.0, "max": 2.0, "avg": 1.5});
    let err = stats.decode(&reader(&missing)).unwrap_err();
    assert!(matches!(err, Error::MissingField(ref path) if path.ends_with("sum")));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Status {
    Draft,
    Published,
}

impl IntEnum for Status {
    fn to_int(self) -> i64 {
        match self {
            Status::Draft => 0,
            Status::Published => 1,
        }
    }

    fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Status::Draft),
            1 => Some(Status::Published),
            _ => None,
        }
    }
}

#[test]
fn test_terms_keys_use_field_type() {
    let status = Field::new("status", IntEnumType::<Status>::default());
    let agg = TermsAgg::new(AggValue::field(&status));

    let response = json!({"buckets": [
        {"key": 1, "doc_count": 10},
        {"key": 0, "doc_count": 3}
    ]});
    let result = agg.decode(&reader(&response)).unwrap();
    assert_eq!(
        result.buckets.iter().map(|b| b.key).collect::<Vec<_>>(),
        vec![Status::Published, Status::Draft]
    );

    let bad = json!({"buckets": [{"key": 7, "doc_count": 1}]});
    let err = agg.decode(&reader(&bad)).unwrap_err();
    assert!(err.to_string().contains("status"));
}

// ---------------------------------------------------------------------------
// Search response
// ---------------------------------------------------------------------------

#[test]
fn test_search_result_with_aggregations() {
    let rank = Field::new("rank", Double);
    let mut search = SearchQuery::new();
    let stats_key = search.aggregate("rank_stats", StatsAgg::new(AggValue::field(&rank)));
    let prepared = search.prepare();

    let response = json!({
        "took": 4,
        "timed_out": false,
        "hits": {"total": 2, "max_score": null, "hits": []},
        "aggregations": {
            "rank_stats": {"count": 2, "min": 80.0, "max": 99.5, "avg": 89.75, "sum": 179.5}
        }
    });
    let result = SearchQueryCompiler::default()
        .decode(&response, &prepared)
        .unwrap();
    assert_eq!(result.total(), Some(2));
    let stats = result.agg(&stats_key).unwrap();
    assert_eq!(stats.sum, 179.5);
    assert_eq!(stats.max, Some(99.5));
}

#[test]
fn test_missing_aggregation_is_a_decode_error() {
    let rank = Field::new("rank", Double);
    let mut search = SearchQuery::new();
    search.aggregate("rank_stats", StatsAgg::new(AggValue::field(&rank)));
    let prepared = search.prepare();

    let response = json!({"took": 1, "hits": {"hits": []}, "aggregations": {}});
    let err = SearchQueryCompiler::default()
        .decode(&response, &prepared)
        .unwrap_err();
    assert!(err.is_decode_error());
    assert_eq!(err.to_string(), "Missing required field: aggregations.rank_stats");
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[test]
fn test_bulk_item_op_detection() {
    let response = json!({"took": 2, "errors": true, "items": [
        {"update": {"_index": "posts", "_id": "1", "_version": 2, "result": "updated",
                    "_seq_no": 5, "_primary_term": 1, "status": 200}},
        {"update": {"_index": "posts", "_id": "2", "status": 404,
                    "error": {"type": "document_missing_exception", "reason": "[2]: document missing",
                              "index": "posts", "index_uuid": "u-1", "shard": "0"}}}
    ]});
    let result = BulkResult::decode(&reader(&response)).unwrap();

    assert!(result.errors);
    match &result.items[0] {
        BulkItemResult::Ok(ok) => {
            assert_eq!(ok.op_type, BulkOpType::Update);
            assert_eq!(ok.result, "updated");
        }
        other => panic!("expected ok item, got {:?}", other),
    }
    match &result.items[1] {
        BulkItemResult::Error(error) => {
            assert_eq!(error.op_type, BulkOpType::Update);
            assert_eq!(error.cause.error_type, "document_missing_exception");
            assert_eq!(error.index, "posts");
        }
        other => panic!("expected error item, got {:?}", other),
    }
    assert_eq!(result.failures().count(), 1);
}
