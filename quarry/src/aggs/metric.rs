//! Metric aggregations

use super::{AggValue, Aggregation, ValueSource};
use crate::compile::SearchQueryCompiler;
use crate::error::Error;
use crate::expression::{NamedExpression, Script};
use crate::json::{ObjectBuilder, ObjectReader};
use crate::query::{Sort, SourceFilter};
use crate::search::{DocSource, SearchHits};
use crate::types::FieldType;
use crate::Result;
use serde_json::{Map, Value};
use std::fmt;

/// Result of a single-value numeric metric; `value` is null over no documents
#[derive(Debug, Clone, PartialEq)]
pub struct ValueResult {
    pub value: Option<f64>,
    pub value_as_string: Option<String>,
}

impl ValueResult {
    fn decode(reader: &ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            value: reader.double_opt("value")?,
            value_as_string: reader.string_opt("value_as_string")?.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountResult {
    pub value: i64,
}

macro_rules! single_value_metric {
    ($(#[$doc:meta])* $ty:ident, $name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $ty<T: FieldType> {
            pub value: AggValue<T>,
            pub missing: Option<T::Value>,
        }

        impl<T: FieldType> $ty<T> {
            pub fn new(value: AggValue<T>) -> Self {
                Self {
                    value,
                    missing: None,
                }
            }

            pub fn missing(mut self, missing: T::Value) -> Self {
                self.missing = Some(missing);
                self
            }
        }

        impl<T: FieldType> NamedExpression for $ty<T> {
            fn name(&self) -> &str {
                $name
            }

            fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
                self.value.write(obj);
                obj.field_opt(
                    "missing",
                    self.missing.as_ref().map(|m| self.value.serialize_term(m)),
                );
            }
        }

        impl<T: FieldType> Aggregation for $ty<T> {
            type Result = ValueResult;

            fn decode(&self, reader: &ObjectReader<'_>) -> Result<ValueResult> {
                ValueResult::decode(reader)
            }
        }
    };
}

single_value_metric!(MinAgg, "min");
single_value_metric!(MaxAgg, "max");
single_value_metric!(AvgAgg, "avg");
single_value_metric!(SumAgg, "sum");

#[derive(Debug, Clone)]
pub struct ValueCountAgg<T: FieldType> {
    pub value: AggValue<T>,
}

impl<T: FieldType> ValueCountAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self { value }
    }
}

impl<T: FieldType> NamedExpression for ValueCountAgg<T> {
    fn name(&self) -> &str {
        "value_count"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
    }
}

impl<T: FieldType> Aggregation for ValueCountAgg<T> {
    type Result = CountResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<CountResult> {
        Ok(CountResult {
            value: reader.long("value")?,
        })
    }
}

/// Approximate distinct count
#[derive(Debug, Clone)]
pub struct CardinalityAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub precision_threshold: Option<u32>,
    pub missing: Option<T::Value>,
}

impl<T: FieldType> CardinalityAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            precision_threshold: None,
            missing: None,
        }
    }

    pub fn precision_threshold(mut self, threshold: u32) -> Self {
        self.precision_threshold = Some(threshold);
        self
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl<T: FieldType> NamedExpression for CardinalityAgg<T> {
    fn name(&self) -> &str {
        "cardinality"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("precision_threshold", self.precision_threshold);
        obj.field_opt(
            "missing",
            self.missing.as_ref().map(|m| self.value.serialize_term(m)),
        );
    }
}

impl<T: FieldType> Aggregation for CardinalityAgg<T> {
    type Result = CountResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<CountResult> {
        Ok(CountResult {
            value: reader.long("value")?,
        })
    }
}

/// `count` and `sum` are always present; the rest are null over no documents
#[derive(Debug, Clone, PartialEq)]
pub struct StatsResult {
    pub count: i64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl StatsResult {
    fn decode(reader: &ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            count: reader.long("count")?,
            sum: reader.double("sum")?,
            min: reader.double_opt("min")?,
            max: reader.double_opt("max")?,
            avg: reader.double_opt("avg")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StatsAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub missing: Option<T::Value>,
}

impl<T: FieldType> StatsAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            missing: None,
        }
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl<T: FieldType> NamedExpression for StatsAgg<T> {
    fn name(&self) -> &str {
        "stats"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt(
            "missing",
            self.missing.as_ref().map(|m| self.value.serialize_term(m)),
        );
    }
}

impl<T: FieldType> Aggregation for StatsAgg<T> {
    type Result = StatsResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<StatsResult> {
        StatsResult::decode(reader)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedStatsResult {
    pub stats: StatsResult,
    pub sum_of_squares: Option<f64>,
    pub variance: Option<f64>,
    pub std_deviation: Option<f64>,
    pub std_deviation_upper: Option<f64>,
    pub std_deviation_lower: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ExtendedStatsAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub sigma: Option<f64>,
    pub missing: Option<T::Value>,
}

impl<T: FieldType> ExtendedStatsAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            sigma: None,
            missing: None,
        }
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl<T: FieldType> NamedExpression for ExtendedStatsAgg<T> {
    fn name(&self) -> &str {
        "extended_stats"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("sigma", self.sigma);
        obj.field_opt(
            "missing",
            self.missing.as_ref().map(|m| self.value.serialize_term(m)),
        );
    }
}

impl<T: FieldType> Aggregation for ExtendedStatsAgg<T> {
    type Result = ExtendedStatsResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<ExtendedStatsResult> {
        let bounds = reader.obj_opt("std_deviation_bounds")?;
        Ok(ExtendedStatsResult {
            stats: StatsResult::decode(reader)?,
            sum_of_squares: reader.double_opt("sum_of_squares")?,
            variance: reader.double_opt("variance")?,
            std_deviation: reader.double_opt("std_deviation")?,
            std_deviation_upper: match &bounds {
                Some(b) => b.double_opt("upper")?,
                None => None,
            },
            std_deviation_lower: match &bounds {
                Some(b) => b.double_opt("lower")?,
                None => None,
            },
        })
    }
}

/// Percentile to value pairs in response order
#[derive(Debug, Clone, PartialEq)]
pub struct PercentilesResult {
    pub values: Vec<(f64, Option<f64>)>,
}

impl PercentilesResult {
    pub fn get(&self, percent: f64) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| *p == percent)
            .and_then(|(_, v)| *v)
    }
}

#[derive(Debug, Clone)]
pub struct PercentilesAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub percents: Vec<f64>,
    pub keyed: Option<bool>,
    pub missing: Option<T::Value>,
}

impl<T: FieldType> PercentilesAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            percents: Vec::new(),
            keyed: None,
            missing: None,
        }
    }

    pub fn percents(mut self, percents: impl IntoIterator<Item = f64>) -> Self {
        self.percents = percents.into_iter().collect();
        self
    }

    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = Some(keyed);
        self
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl<T: FieldType> NamedExpression for PercentilesAgg<T> {
    fn name(&self) -> &str {
        "percentiles"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        if !self.percents.is_empty() {
            obj.field("percents", self.percents.clone());
        }
        obj.field_opt("keyed", self.keyed);
        obj.field_opt(
            "missing",
            self.missing.as_ref().map(|m| self.value.serialize_term(m)),
        );
    }
}

impl<T: FieldType> Aggregation for PercentilesAgg<T> {
    type Result = PercentilesResult;

    // keyed (default) responses are an object of "99.0" -> value, otherwise
    // an array of {key, value}
    fn decode(&self, reader: &ObjectReader<'_>) -> Result<PercentilesResult> {
        let path = reader.path_of("values");
        let values = match reader.value("values")? {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| {
                    let percent = key
                        .parse::<f64>()
                        .map_err(|_| Error::invalid_type(format!("{}.{}", path, key), "number"))?;
                    Ok((percent, value.as_f64()))
                })
                .collect::<Result<Vec<_>>>()?,
            Value::Array(_) => reader
                .array("values")?
                .objs()
                .map(|item| {
                    let item = item?;
                    Ok((item.double("key")?, item.double_opt("value")?))
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::invalid_type(path, "object or array")),
        };
        Ok(PercentilesResult { values })
    }
}

/// Average of `value` weighted by `weight`
#[derive(Debug, Clone)]
pub struct WeightedAvgAgg<V: FieldType, W: FieldType> {
    pub value: ValueSource<V>,
    pub weight: ValueSource<W>,
    pub format: Option<String>,
}

impl<V: FieldType, W: FieldType> WeightedAvgAgg<V, W> {
    pub fn new(value: ValueSource<V>, weight: ValueSource<W>) -> Self {
        Self {
            value,
            weight,
            format: None,
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl<V: FieldType, W: FieldType> NamedExpression for WeightedAvgAgg<V, W> {
    fn name(&self) -> &str {
        "weighted_avg"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.obj("value", |v| self.value.write(v));
        obj.obj("weight", |w| self.weight.write(w));
        obj.field_opt("format", self.format.as_deref());
    }
}

impl<V: FieldType, W: FieldType> Aggregation for WeightedAvgAgg<V, W> {
    type Result = ValueResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<ValueResult> {
        ValueResult::decode(reader)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMetricResult {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMetricAgg {
    pub init_script: Option<Script>,
    pub map_script: Script,
    pub combine_script: Option<Script>,
    pub reduce_script: Option<Script>,
    pub params: Map<String, Value>,
}

impl ScriptedMetricAgg {
    pub fn new(map_script: Script) -> Self {
        Self {
            init_script: None,
            map_script,
            combine_script: None,
            reduce_script: None,
            params: Map::new(),
        }
    }

    pub fn init_script(mut self, script: Script) -> Self {
        self.init_script = Some(script);
        self
    }

    pub fn combine_script(mut self, script: Script) -> Self {
        self.combine_script = Some(script);
        self
    }

    pub fn reduce_script(mut self, script: Script) -> Self {
        self.reduce_script = Some(script);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl NamedExpression for ScriptedMetricAgg {
    fn name(&self) -> &str {
        "scripted_metric"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        if let Some(script) = &self.init_script {
            obj.obj("init_script", |s| script.write(s));
        }
        obj.obj("map_script", |s| self.map_script.write(s));
        if let Some(script) = &self.combine_script {
            obj.obj("combine_script", |s| script.write(s));
        }
        if let Some(script) = &self.reduce_script {
            obj.obj("reduce_script", |s| script.write(s));
        }
        if !self.params.is_empty() {
            obj.field("params", Value::Object(self.params.clone()));
        }
    }
}

impl Aggregation for ScriptedMetricAgg {
    type Result = ScriptedMetricResult;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<ScriptedMetricResult> {
        Ok(ScriptedMetricResult {
            value: reader.value_opt("value").cloned().unwrap_or(Value::Null),
        })
    }
}

pub type TopHitsResult<S> = SearchHits<S>;

/// Best matching documents per bucket, decoded like top-level search hits
#[derive(Clone)]
pub struct TopHitsAgg<S> {
    pub size: Option<u32>,
    pub from: Option<u32>,
    pub sort: Vec<Sort>,
    pub source: Option<SourceFilter>,
    doc_source: DocSource<S>,
}

impl TopHitsAgg<Value> {
    /// Hits keep `_source` as raw JSON
    pub fn new() -> Self {
        Self::with_source(DocSource::raw())
    }
}

impl Default for TopHitsAgg<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TopHitsAgg<S> {
    pub fn with_source(doc_source: DocSource<S>) -> Self {
        Self {
            size: None,
            from: None,
            sort: Vec::new(),
            source: None,
            doc_source,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn from(mut self, from: u32) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn source(mut self, source: SourceFilter) -> Self {
        self.source = Some(source);
        self
    }
}

impl<S> fmt::Debug for TopHitsAgg<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopHitsAgg")
            .field("size", &self.size)
            .field("from", &self.from)
            .field("sort", &self.sort)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<S> NamedExpression for TopHitsAgg<S> {
    fn name(&self) -> &str {
        "top_hits"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        obj.field_opt("from", self.from)
            .field_opt("size", self.size);
        if !self.sort.is_empty() {
            obj.array("sort", |a| {
                for sort in &self.sort {
                    sort.write(a, compiler);
                }
            });
        }
        obj.field_opt("_source", self.source.as_ref().map(SourceFilter::to_value));
    }
}

impl<S: fmt::Debug + Send + Sync + 'static> Aggregation for TopHitsAgg<S> {
    type Result = TopHitsResult<S>;

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<TopHitsResult<S>> {
        SearchHits::decode(&reader.obj("hits")?, &self.doc_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggs::Aggs;
    use crate::query::Order;
    use crate::types::{Double, Field, Integer, Long};
    use serde_json::json;

    fn body(agg: &impl NamedExpression) -> Value {
        let mut obj = ObjectBuilder::new();
        agg.serialize(&mut obj, &SearchQueryCompiler::default());
        obj.into_value()
    }

    fn decode<A: Aggregation>(agg: &A, response: Value) -> Result<A::Result> {
        agg.decode(&ObjectReader::from_value(&response).unwrap())
    }

    // ===================================================================
    // Single value metrics
    // ===================================================================

    #[test]
    fn test_single_value_metric() {
        let rank = Field::new("rank", Double);
        let avg = AvgAgg::new(AggValue::field(&rank)).missing(0.0);
        assert_eq!(body(&avg), json!({"avg": {"field": "rank", "missing": 0.0}}));

        let result = decode(&avg, json!({"value": null})).unwrap();
        assert_eq!(result.value, None);
        let result = decode(&avg, json!({"value": 4.5, "value_as_string": "4.5"})).unwrap();
        assert_eq!(result.value, Some(4.5));
        assert_eq!(result.value_as_string.as_deref(), Some("4.5"));
    }

    #[test]
    fn test_cardinality() {
        let user = Field::new("user_id", Long);
        let agg = CardinalityAgg::new(AggValue::field(&user)).precision_threshold(100);
        assert_eq!(
            body(&agg),
            json!({"cardinality": {"field": "user_id", "precision_threshold": 100}})
        );
        assert_eq!(decode(&agg, json!({"value": 42})).unwrap().value, 42);
    }

    // ===================================================================
    // Stats
    // ===================================================================

    #[test]
    fn test_stats_optional_and_mandatory_fields() {
        let rank = Field::new("rank", Double);
        let agg = StatsAgg::new(AggValue::field(&rank));

        let empty = decode(
            &agg,
            json!({"count": 0, "min": null, "max": null, "avg": null, "sum": 0.0}),
        )
        .unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.min, None);
        assert_eq!(empty.avg, None);

        let err = decode(&agg, json!({"count": 3, "min": 1.0})).unwrap_err();
        assert!(matches!(err, Error::MissingField(ref path) if path == "sum"));
    }

    #[test]
    fn test_extended_stats() {
        let rank = Field::new("rank", Double);
        let agg = ExtendedStatsAgg::new(AggValue::field(&rank)).sigma(3.0);
        assert_eq!(
            body(&agg),
            json!({"extended_stats": {"field": "rank", "sigma": 3.0}})
        );

        let result = decode(
            &agg,
            json!({
                "count": 2, "min": 1.0, "max": 3.0, "avg": 2.0, "sum": 4.0,
                "sum_of_squares": 10.0, "variance": 1.0, "std_deviation": 1.0,
                "std_deviation_bounds": {"upper": 5.0, "lower": -1.0}
            }),
        )
        .unwrap();
        assert_eq!(result.stats.sum, 4.0);
        assert_eq!(result.std_deviation_upper, Some(5.0));
        assert_eq!(result.std_deviation_lower, Some(-1.0));
    }

    // ===================================================================
    // Percentiles
    // ===================================================================

    #[test]
    fn test_percentiles_both_shapes() {
        let latency = Field::new("latency", Double);
        let agg = PercentilesAgg::new(AggValue::field(&latency)).percents([50.0, 99.0]);
        assert_eq!(
            body(&agg),
            json!({"percentiles": {"field": "latency", "percents": [50.0, 99.0]}})
        );

        let keyed = decode(&agg, json!({"values": {"50.0": 12.5, "99.0": 80.0}})).unwrap();
        let listed = decode(
            &agg,
            json!({"values": [{"key": 50.0, "value": 12.5}, {"key": 99.0, "value": 80.0}]}),
        )
        .unwrap();
        assert_eq!(keyed, listed);
        assert_eq!(keyed.get(99.0), Some(80.0));
    }

    // ===================================================================
    // Weighted avg / scripted metric / top hits
    // ===================================================================

    #[test]
    fn test_weighted_avg_value_sources() {
        let grade = Field::new("grade", Integer);
        let weight = Field::new("weight", Double);
        let agg = WeightedAvgAgg::new(
            ValueSource::new(AggValue::field(&grade)),
            ValueSource::new(AggValue::field(&weight)).missing(1.0),
        );
        assert_eq!(
            body(&agg),
            json!({"weighted_avg": {
                "value": {"field": "grade"},
                "weight": {"field": "weight", "missing": 1.0}
            }})
        );
    }

    #[test]
    fn test_scripted_metric() {
        let agg = ScriptedMetricAgg::new(Script::source("state.sum += doc['x'].value"))
            .init_script(Script::source("state.sum = 0"))
            .reduce_script(Script::source("return states.sum()"));
        let text = serde_json::to_string(&body(&agg)).unwrap();
        assert_eq!(
            text,
            concat!(
                r#"{"scripted_metric":{"init_script":{"source":"state.sum = 0"},"#,
                r#""map_script":{"source":"state.sum += doc['x'].value"},"#,
                r#""reduce_script":{"source":"return states.sum()"}}}"#
            )
        );
        assert_eq!(
            decode(&agg, json!({"value": 17})).unwrap().value,
            json!(17)
        );
    }

    #[test]
    fn test_top_hits_reuses_hit_decoding() {
        let agg = TopHitsAgg::new()
            .size(1)
            .sort(Sort::field("date").order(Order::Desc));
        assert_eq!(
            body(&agg),
            json!({"top_hits": {"size": 1, "sort": [{"date": {"order": "desc"}}]}})
        );

        let result = decode(
            &agg,
            json!({"hits": {
                "total": {"value": 3, "relation": "eq"},
                "max_score": null,
                "hits": [{"_index": "posts", "_id": "7", "_score": null,
                          "_source": {"title": "hello"}, "sort": [1700000000000i64]}]
            }}),
        )
        .unwrap();
        assert_eq!(result.total.as_ref().map(|t| t.value), Some(3));
        assert_eq!(result.hits[0].id, "7");
        assert_eq!(result.hits[0].doc_type, "_doc");
        assert_eq!(result.hits[0].source, Some(json!({"title": "hello"})));

        let mut aggs = Aggs::new();
        aggs.add("latest", agg);
        assert_eq!(aggs.len(), 1);
    }
}
