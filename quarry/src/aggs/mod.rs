//! Aggregation library
//!
//! Every aggregation writes its request body through [`NamedExpression`] and
//! decodes its own part of the response into a typed [`Aggregation::Result`].
//! Aggregations are registered by name in an ordered [`Aggs`] collection,
//! which hands back an [`AggKey`] used for type-safe lookup of the decoded
//! result in [`AggResults`].
//!
//! Supported aggregations:
//! - metric: `min`, `max`, `avg`, `sum`, `value_count`, `cardinality`,
//!   `stats`, `extended_stats`, `percentiles`, `weighted_avg`,
//!   `scripted_metric`, `top_hits`
//! - bucket: `terms`, `significant_terms`, `histogram`, `date_histogram`,
//!   `range`, `date_range`, `filter`, `filters`, `global`, `nested`,
//!   `reverse_nested`

mod bucket;
mod metric;
mod value;

pub use bucket::{
    AggRange, Bucket, DateHistogramAgg, DateHistogramBucket, DateRangeAgg, FilterAgg, FiltersAgg,
    FiltersBucket, FiltersResult, GlobalAgg, HistogramAgg, HistogramBucket, HistogramResult,
    KeyedBucket, NestedAgg, RangeAgg, RangeBucket, RangeResult, ReverseNestedAgg,
    SignificantTermsAgg, SignificantTermsBucket, SignificantTermsResult, SingleBucketResult,
    TermsAgg, TermsResult,
};
pub use metric::{
    AvgAgg, CardinalityAgg, CountResult, ExtendedStatsAgg, ExtendedStatsResult, MaxAgg, MinAgg,
    PercentilesAgg, PercentilesResult, ScriptedMetricAgg, ScriptedMetricResult, StatsAgg,
    StatsResult, SumAgg, TopHitsAgg, TopHitsResult, ValueCountAgg, ValueResult, WeightedAvgAgg,
};
pub use value::{AggValue, ValueSource};

use crate::compile::SearchQueryCompiler;
use crate::expression::NamedExpression;
use crate::json::{ObjectBuilder, ObjectReader};
use crate::query::Order;
use crate::Result;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// An aggregation with a typed response
pub trait Aggregation: NamedExpression + fmt::Debug + Send + Sync + 'static {
    type Result: fmt::Debug + Send + Sync + 'static;

    /// Sub-aggregations written next to the body under `aggs`
    fn sub_aggs(&self) -> Option<&Aggs> {
        None
    }

    /// Decodes the object found under this aggregation's name
    fn decode(&self, reader: &ObjectReader<'_>) -> Result<Self::Result>;
}

/// Object-safe view of an [`Aggregation`]
pub trait DynAggregation: fmt::Debug + Send + Sync {
    /// Writes `{"<type>": {...}, "aggs"?: {...}}`
    fn write_container(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler);

    fn decode_dyn(&self, reader: &ObjectReader<'_>) -> Result<Arc<dyn AggregationResult>>;
}

impl<A: Aggregation> DynAggregation for A {
    fn write_container(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        self.serialize(obj, compiler);
        if let Some(subs) = self.sub_aggs().filter(|subs| !subs.is_empty()) {
            obj.obj("aggs", |a| subs.write(a, compiler));
        }
    }

    fn decode_dyn(&self, reader: &ObjectReader<'_>) -> Result<Arc<dyn AggregationResult>> {
        Ok(Arc::new(self.decode(reader)?))
    }
}

/// Decoded aggregation result of any type
pub trait AggregationResult: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> AggregationResult for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Typed key of a registered aggregation
pub struct AggKey<R> {
    name: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R> AggKey<R> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<R> Clone for AggKey<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R> fmt::Debug for AggKey<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AggKey({})", self.name)
    }
}

/// Named aggregations in definition order
#[derive(Debug, Clone, Default)]
pub struct Aggs {
    entries: Vec<(String, Arc<dyn DynAggregation>)>,
}

impl Aggs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `agg` under `name`, replacing a previous one in place
    pub fn add<A: Aggregation>(&mut self, name: impl Into<String>, agg: A) -> AggKey<A::Result> {
        let name = name.into();
        let agg: Arc<dyn DynAggregation> = Arc::new(agg);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = agg,
            None => self.entries.push((name.clone(), agg)),
        }
        AggKey {
            name,
            _marker: PhantomData,
        }
    }

    /// Builder form of [`Aggs::add`]
    pub fn with<A: Aggregation>(mut self, name: impl Into<String>, agg: A) -> Self {
        self.add(name, agg);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn write(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        for (name, agg) in &self.entries {
            obj.obj(name.as_str(), |a| agg.write_container(a, compiler));
        }
    }

    /// Decodes every registered aggregation from `reader`, which holds one
    /// object per aggregation name
    pub fn decode(&self, reader: &ObjectReader<'_>) -> Result<AggResults> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (name, agg) in &self.entries {
            let result = agg.decode_dyn(&reader.obj(name)?)?;
            entries.push((name.clone(), result));
        }
        Ok(AggResults { entries })
    }
}

/// Decoded aggregation results, looked up with the [`AggKey`] returned at
/// registration
#[derive(Debug, Clone, Default)]
pub struct AggResults {
    entries: Vec<(String, Arc<dyn AggregationResult>)>,
}

impl AggResults {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get<R: Any>(&self, key: &AggKey<R>) -> Option<&R> {
        self.raw(key.name())
            .and_then(|result| result.as_any().downcast_ref::<R>())
    }

    pub fn raw(&self, name: &str) -> Option<&dyn AggregationResult> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, result)| &**result)
    }
}

/// Bucket ordering: one entry writes an object, several write an array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketsOrder {
    entries: Vec<(String, Order)>,
}

impl BucketsOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by(mut self, key: impl Into<String>, order: Order) -> Self {
        self.entries.push((key.into(), order));
        self
    }

    pub fn count(self, order: Order) -> Self {
        self.by("_count", order)
    }

    pub fn key(self, order: Order) -> Self {
        self.by("_key", order)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn write(&self, obj: &mut ObjectBuilder) {
        match self.entries.as_slice() {
            [] => {}
            [(key, order)] => {
                obj.obj("order", |o| {
                    o.field(key.as_str(), order.as_str());
                });
            }
            entries => {
                obj.array("order", |a| {
                    for (key, order) in entries {
                        a.obj(|o| {
                            o.field(key.as_str(), order.as_str());
                        });
                    }
                });
            }
        }
    }
}

/// Decodes the sub-aggregations present in a bucket object
pub(crate) fn decode_sub_aggs(aggs: &Aggs, bucket: &ObjectReader<'_>) -> Result<AggResults> {
    if aggs.is_empty() {
        return Ok(AggResults::default());
    }
    aggs.decode(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Double, Field, Keyword};
    use serde_json::{json, Value};

    #[test]
    fn test_buckets_order_shapes() {
        let mut single = ObjectBuilder::new();
        BucketsOrder::new().count(Order::Desc).write(&mut single);
        assert_eq!(single.into_value(), json!({"order": {"_count": "desc"}}));

        let mut multi = ObjectBuilder::new();
        BucketsOrder::new()
            .count(Order::Desc)
            .key(Order::Asc)
            .write(&mut multi);
        assert_eq!(
            multi.into_value(),
            json!({"order": [{"_count": "desc"}, {"_key": "asc"}]})
        );
    }

    #[test]
    fn test_aggs_write_sub_aggregations() {
        let rank = Field::new("rank", Double);
        let genre = Field::new("genre", Keyword);
        let subs = Aggs::new().with("avg_rank", AvgAgg::new(AggValue::field(&rank)));
        let aggs = Aggs::new().with("genres", TermsAgg::new(AggValue::field(&genre)).aggs(subs));

        let mut obj = ObjectBuilder::new();
        aggs.write(&mut obj, &SearchQueryCompiler::default());
        assert_eq!(
            obj.into_value(),
            json!({"genres": {
                "terms": {"field": "genre"},
                "aggs": {"avg_rank": {"avg": {"field": "rank"}}}
            }})
        );
    }

    #[test]
    fn test_typed_lookup() {
        let rank = Field::new("rank", Double);
        let mut aggs = Aggs::new();
        let max_key = aggs.add("max_rank", MaxAgg::new(AggValue::field(&rank)));
        let stats_key = aggs.add("rank_stats", StatsAgg::new(AggValue::field(&rank)));

        let response = json!({
            "max_rank": {"value": 99.5},
            "rank_stats": {"count": 2, "min": 80.0, "max": 99.5, "avg": 89.75, "sum": 179.5}
        });
        let results = aggs
            .decode(&ObjectReader::from_value(&response).unwrap())
            .unwrap();

        assert_eq!(results.get(&max_key).unwrap().value, Some(99.5));
        assert_eq!(results.get(&stats_key).unwrap().count, 2);
        assert_eq!(aggs.names().collect::<Vec<_>>(), vec!["max_rank", "rank_stats"]);
    }

    #[test]
    fn test_missing_aggregation_names_path() {
        let rank = Field::new("rank", Double);
        let aggs = Aggs::new().with("max_rank", MaxAgg::new(AggValue::field(&rank)));
        let response: Value = json!({});
        let err = aggs
            .decode(&ObjectReader::with_path(response.as_object().unwrap(), "aggregations"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: aggregations.max_rank");
    }
}
