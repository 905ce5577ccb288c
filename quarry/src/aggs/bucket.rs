//! Bucket aggregations

use super::{decode_sub_aggs, AggKey, AggResults, AggValue, Aggregation, Aggs, BucketsOrder};
use crate::compile::SearchQueryCompiler;
use crate::error::Error;
use crate::expression::NamedExpression;
use crate::json::{ArrayBuilder, ObjectBuilder, ObjectReader};
use crate::query::{MatchAll, QueryExpression};
use crate::types::{Date, FieldType};
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Common view over decoded buckets
pub trait Bucket {
    fn doc_count(&self) -> i64;

    fn aggs(&self) -> &AggResults;
}

macro_rules! impl_bucket {
    ($([$($g:tt)*] $ty:ty),* $(,)?) => {
        $(
            impl<$($g)*> Bucket for $ty {
                fn doc_count(&self) -> i64 {
                    self.doc_count
                }

                fn aggs(&self) -> &AggResults {
                    &self.aggs
                }
            }
        )*
    };
}

macro_rules! sub_aggs {
    ($([$($g:tt)*] $ty:ty),* $(,)?) => {
        $(
            impl<$($g)*> $ty {
                pub fn aggs(mut self, aggs: Aggs) -> Self {
                    self.aggs = aggs;
                    self
                }

                /// Registers a sub-aggregation, evaluated once per bucket
                pub fn sub_agg<A: Aggregation>(
                    &mut self,
                    name: impl Into<String>,
                    agg: A,
                ) -> AggKey<A::Result> {
                    self.aggs.add(name, agg)
                }
            }
        )*
    };
}

/// Walks `buckets`, which is either an array of unnamed buckets or an object
/// of buckets keyed by name
fn decode_buckets<B>(
    reader: &ObjectReader<'_>,
    mut decode: impl FnMut(Option<&str>, &ObjectReader<'_>) -> Result<B>,
) -> Result<Vec<B>> {
    let path = reader.path_of("buckets");
    match reader.value("buckets")? {
        Value::Array(_) => reader
            .array("buckets")?
            .objs()
            .map(|bucket| decode(None, &bucket?))
            .collect(),
        Value::Object(_) => {
            let buckets = reader.obj("buckets")?;
            buckets
                .keys()
                .map(|name| decode(Some(name), &buckets.obj(name)?))
                .collect()
        }
        _ => Err(Error::invalid_type(path, "array or object")),
    }
}

fn write_missing<T: FieldType>(obj: &mut ObjectBuilder, value: &AggValue<T>, missing: &Option<T::Value>) {
    obj.field_opt("missing", missing.as_ref().map(|m| value.serialize_term(m)));
}

fn reduced_or_match_all(query: &QueryExpression) -> QueryExpression {
    query.reduce().unwrap_or_else(|| MatchAll::new().into())
}

// ===================================================================
// terms
// ===================================================================

/// Bucket with a typed key
#[derive(Debug, Clone)]
pub struct KeyedBucket<K> {
    pub key: K,
    pub key_as_string: Option<String>,
    pub doc_count: i64,
    pub aggs: AggResults,
}

#[derive(Debug, Clone)]
pub struct TermsResult<K> {
    pub doc_count_error_upper_bound: i64,
    pub sum_other_doc_count: i64,
    pub buckets: Vec<KeyedBucket<K>>,
}

#[derive(Debug, Clone)]
pub struct TermsAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub size: Option<u32>,
    pub shard_size: Option<u32>,
    pub min_doc_count: Option<u64>,
    pub include: Option<Value>,
    pub exclude: Option<Value>,
    pub missing: Option<T::Value>,
    pub order: BucketsOrder,
    pub aggs: Aggs,
}

impl<T: FieldType> TermsAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            size: None,
            shard_size: None,
            min_doc_count: None,
            include: None,
            exclude: None,
            missing: None,
            order: BucketsOrder::new(),
            aggs: Aggs::new(),
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn shard_size(mut self, shard_size: u32) -> Self {
        self.shard_size = Some(shard_size);
        self
    }

    pub fn min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = Some(min_doc_count);
        self
    }

    /// Regex string or list of exact values
    pub fn include(mut self, include: impl Into<Value>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn exclude(mut self, exclude: impl Into<Value>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn order(mut self, order: BucketsOrder) -> Self {
        self.order = order;
        self
    }
}

impl<T: FieldType> NamedExpression for TermsAgg<T> {
    fn name(&self) -> &str {
        "terms"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("size", self.size)
            .field_opt("shard_size", self.shard_size)
            .field_opt("min_doc_count", self.min_doc_count)
            .field_opt("include", self.include.clone())
            .field_opt("exclude", self.exclude.clone());
        write_missing(obj, &self.value, &self.missing);
        self.order.write(obj);
    }
}

impl<T: FieldType> Aggregation for TermsAgg<T> {
    type Result = TermsResult<T::Value>;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<TermsResult<T::Value>> {
        let buckets = reader
            .array("buckets")?
            .objs()
            .map(|bucket| {
                let bucket = bucket?;
                Ok(KeyedBucket {
                    key: self.value.deserialize_term(bucket.value("key")?)?,
                    key_as_string: bucket.string_opt("key_as_string")?.map(str::to_string),
                    doc_count: bucket.long("doc_count")?,
                    aggs: decode_sub_aggs(&self.aggs, &bucket)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TermsResult {
            doc_count_error_upper_bound: reader
                .long_opt("doc_count_error_upper_bound")?
                .unwrap_or(0),
            sum_other_doc_count: reader.long_opt("sum_other_doc_count")?.unwrap_or(0),
            buckets,
        })
    }
}

// ===================================================================
// significant_terms
// ===================================================================

#[derive(Debug, Clone)]
pub struct SignificantTermsBucket<K> {
    pub key: K,
    pub doc_count: i64,
    pub bg_count: Option<i64>,
    pub score: Option<f64>,
    pub aggs: AggResults,
}

#[derive(Debug, Clone)]
pub struct SignificantTermsResult<K> {
    pub doc_count: Option<i64>,
    pub bg_count: Option<i64>,
    pub buckets: Vec<SignificantTermsBucket<K>>,
}

#[derive(Debug, Clone)]
pub struct SignificantTermsAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub size: Option<u32>,
    pub min_doc_count: Option<u64>,
    pub background_filter: Option<QueryExpression>,
    pub aggs: Aggs,
}

impl<T: FieldType> SignificantTermsAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            size: None,
            min_doc_count: None,
            background_filter: None,
            aggs: Aggs::new(),
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = Some(min_doc_count);
        self
    }

    pub fn background_filter(mut self, query: impl Into<QueryExpression>) -> Self {
        self.background_filter = Some(query.into());
        self
    }
}

impl<T: FieldType> NamedExpression for SignificantTermsAgg<T> {
    fn name(&self) -> &str {
        "significant_terms"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("size", self.size)
            .field_opt("min_doc_count", self.min_doc_count);
        if let Some(filter) = self.background_filter.as_ref().and_then(QueryExpression::reduce) {
            obj.obj("background_filter", |f| filter.serialize(f, compiler));
        }
    }
}

impl<T: FieldType> Aggregation for SignificantTermsAgg<T> {
    type Result = SignificantTermsResult<T::Value>;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<SignificantTermsResult<T::Value>> {
        let buckets = reader
            .array("buckets")?
            .objs()
            .map(|bucket| {
                let bucket = bucket?;
                Ok(SignificantTermsBucket {
                    key: self.value.deserialize_term(bucket.value("key")?)?,
                    doc_count: bucket.long("doc_count")?,
                    bg_count: bucket.long_opt("bg_count")?,
                    score: bucket.double_opt("score")?,
                    aggs: decode_sub_aggs(&self.aggs, &bucket)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SignificantTermsResult {
            doc_count: reader.long_opt("doc_count")?,
            bg_count: reader.long_opt("bg_count")?,
            buckets,
        })
    }
}

// ===================================================================
// histogram / date_histogram
// ===================================================================

#[derive(Debug, Clone)]
pub struct HistogramBucket {
    pub key: f64,
    pub key_as_string: Option<String>,
    pub doc_count: i64,
    pub aggs: AggResults,
}

#[derive(Debug, Clone)]
pub struct HistogramResult<B> {
    pub buckets: Vec<B>,
}

#[derive(Debug, Clone)]
pub struct HistogramAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub interval: f64,
    pub offset: Option<f64>,
    pub min_doc_count: Option<u64>,
    pub extended_bounds: Option<(f64, f64)>,
    pub keyed: Option<bool>,
    pub missing: Option<T::Value>,
    pub order: BucketsOrder,
    pub aggs: Aggs,
}

impl<T: FieldType> HistogramAgg<T> {
    pub fn new(value: AggValue<T>, interval: f64) -> Self {
        Self {
            value,
            interval,
            offset: None,
            min_doc_count: None,
            extended_bounds: None,
            keyed: None,
            missing: None,
            order: BucketsOrder::new(),
            aggs: Aggs::new(),
        }
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = Some(min_doc_count);
        self
    }

    pub fn extended_bounds(mut self, min: f64, max: f64) -> Self {
        self.extended_bounds = Some((min, max));
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

    pub fn order(mut self, order: BucketsOrder) -> Self {
        self.order = order;
        self
    }
}

impl<T: FieldType> NamedExpression for HistogramAgg<T> {
    fn name(&self) -> &str {
        "histogram"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field("interval", self.interval)
            .field_opt("offset", self.offset)
            .field_opt("min_doc_count", self.min_doc_count);
        if let Some((min, max)) = self.extended_bounds {
            obj.obj("extended_bounds", |b| {
                b.field("min", min).field("max", max);
            });
        }
        obj.field_opt("keyed", self.keyed);
        write_missing(obj, &self.value, &self.missing);
        self.order.write(obj);
    }
}

impl<T: FieldType> Aggregation for HistogramAgg<T> {
    type Result = HistogramResult<HistogramBucket>;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<HistogramResult<HistogramBucket>> {
        let buckets = decode_buckets(reader, |_, bucket| {
            Ok(HistogramBucket {
                key: bucket.double("key")?,
                key_as_string: bucket.string_opt("key_as_string")?.map(str::to_string),
                doc_count: bucket.long("doc_count")?,
                aggs: decode_sub_aggs(&self.aggs, bucket)?,
            })
        })?;
        Ok(HistogramResult { buckets })
    }
}

#[derive(Debug, Clone)]
pub struct DateHistogramBucket {
    pub key: DateTime<Utc>,
    pub key_as_string: Option<String>,
    pub doc_count: i64,
    pub aggs: AggResults,
}

#[derive(Debug, Clone)]
pub struct DateHistogramAgg {
    pub value: AggValue<Date>,
    pub calendar_interval: Option<String>,
    pub fixed_interval: Option<String>,
    pub format: Option<String>,
    pub time_zone: Option<String>,
    pub min_doc_count: Option<u64>,
    pub keyed: Option<bool>,
    pub order: BucketsOrder,
    pub aggs: Aggs,
}

impl DateHistogramAgg {
    fn with_value(value: AggValue<Date>) -> Self {
        Self {
            value,
            calendar_interval: None,
            fixed_interval: None,
            format: None,
            time_zone: None,
            min_doc_count: None,
            keyed: None,
            order: BucketsOrder::new(),
            aggs: Aggs::new(),
        }
    }

    /// Calendar-aware interval such as `1d`, `1M`, `quarter`
    pub fn calendar(value: AggValue<Date>, interval: impl Into<String>) -> Self {
        Self {
            calendar_interval: Some(interval.into()),
            ..Self::with_value(value)
        }
    }

    /// Fixed interval such as `90m`, `12h`
    pub fn fixed(value: AggValue<Date>, interval: impl Into<String>) -> Self {
        Self {
            fixed_interval: Some(interval.into()),
            ..Self::with_value(value)
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = Some(min_doc_count);
        self
    }

    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = Some(keyed);
        self
    }

    pub fn order(mut self, order: BucketsOrder) -> Self {
        self.order = order;
        self
    }
}

impl NamedExpression for DateHistogramAgg {
    fn name(&self) -> &str {
        "date_histogram"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("calendar_interval", self.calendar_interval.as_deref())
            .field_opt("fixed_interval", self.fixed_interval.as_deref())
            .field_opt("format", self.format.as_deref())
            .field_opt("time_zone", self.time_zone.as_deref())
            .field_opt("min_doc_count", self.min_doc_count)
            .field_opt("keyed", self.keyed);
        self.order.write(obj);
    }
}

impl Aggregation for DateHistogramAgg {
    type Result = HistogramResult<DateHistogramBucket>;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    // keys are epoch millis regardless of `format`
    fn decode(&self, reader: &ObjectReader<'_>) -> Result<HistogramResult<DateHistogramBucket>> {
        let buckets = decode_buckets(reader, |_, bucket| {
            Ok(DateHistogramBucket {
                key: self.value.deserialize_term(bucket.value("key")?)?,
                key_as_string: bucket.string_opt("key_as_string")?.map(str::to_string),
                doc_count: bucket.long("doc_count")?,
                aggs: decode_sub_aggs(&self.aggs, bucket)?,
            })
        })?;
        Ok(HistogramResult { buckets })
    }
}

// ===================================================================
// range / date_range
// ===================================================================

/// One requested range, `[from, to)`
#[derive(Debug, Clone, PartialEq)]
pub struct AggRange<V> {
    pub key: Option<String>,
    pub from: Option<V>,
    pub to: Option<V>,
}

impl<V> AggRange<V> {
    pub fn new(from: Option<V>, to: Option<V>) -> Self {
        Self {
            key: None,
            from,
            to,
        }
    }

    pub fn keyed(key: impl Into<String>, from: Option<V>, to: Option<V>) -> Self {
        Self {
            key: Some(key.into()),
            from,
            to,
        }
    }

    fn write(&self, arr: &mut ArrayBuilder, term: impl Fn(&V) -> Value) {
        arr.obj(|r| {
            r.field_opt("key", self.key.as_deref())
                .field_opt("from", self.from.as_ref().map(&term))
                .field_opt("to", self.to.as_ref().map(&term));
        });
    }
}

#[derive(Debug, Clone)]
pub struct RangeBucket {
    /// Bucket name; the object key in keyed responses
    pub key: Option<String>,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub from_as_string: Option<String>,
    pub to_as_string: Option<String>,
    pub doc_count: i64,
    pub aggs: AggResults,
}

#[derive(Debug, Clone)]
pub struct RangeResult {
    pub buckets: Vec<RangeBucket>,
}

impl RangeResult {
    /// Keyed responses are put in the order of `declared`; buckets whose key
    /// was not declared follow in response order
    fn decode<V>(reader: &ObjectReader<'_>, aggs: &Aggs, declared: &[AggRange<V>]) -> Result<Self> {
        let keyed = matches!(reader.value("buckets")?, Value::Object(_));
        let mut buckets = decode_buckets(reader, |name, bucket| {
            let key = match name {
                Some(name) => Some(name.to_string()),
                None => bucket.string_opt("key")?.map(str::to_string),
            };
            Ok(RangeBucket {
                key,
                from: bucket.double_opt("from")?,
                to: bucket.double_opt("to")?,
                from_as_string: bucket.string_opt("from_as_string")?.map(str::to_string),
                to_as_string: bucket.string_opt("to_as_string")?.map(str::to_string),
                doc_count: bucket.long("doc_count")?,
                aggs: decode_sub_aggs(aggs, bucket)?,
            })
        })?;
        if keyed {
            buckets.sort_by_key(|bucket| {
                declared
                    .iter()
                    .position(|range| range.key.is_some() && range.key == bucket.key)
                    .unwrap_or(declared.len())
            });
        }
        Ok(Self { buckets })
    }

    pub fn get(&self, key: &str) -> Option<&RangeBucket> {
        self.buckets.iter().find(|b| b.key.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone)]
pub struct RangeAgg<T: FieldType> {
    pub value: AggValue<T>,
    pub ranges: Vec<AggRange<T::Value>>,
    pub keyed: Option<bool>,
    pub missing: Option<T::Value>,
    pub aggs: Aggs,
}

impl<T: FieldType> RangeAgg<T> {
    pub fn new(value: AggValue<T>) -> Self {
        Self {
            value,
            ranges: Vec::new(),
            keyed: None,
            missing: None,
            aggs: Aggs::new(),
        }
    }

    pub fn range(mut self, range: AggRange<T::Value>) -> Self {
        self.ranges.push(range);
        self
    }

    /// Asks for buckets as an object keyed by range name
    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = Some(keyed);
        self
    }

    pub fn missing(mut self, missing: T::Value) -> Self {
        self.missing = Some(missing);
        self
    }
}

impl<T: FieldType> NamedExpression for RangeAgg<T> {
    fn name(&self) -> &str {
        "range"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.array("ranges", |a| {
            for range in &self.ranges {
                range.write(a, |v| self.value.serialize_term(v));
            }
        });
        obj.field_opt("keyed", self.keyed);
        write_missing(obj, &self.value, &self.missing);
    }
}

impl<T: FieldType> Aggregation for RangeAgg<T> {
    type Result = RangeResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<RangeResult> {
        RangeResult::decode(reader, &self.aggs, &self.ranges)
    }
}

/// Range over dates; bounds are date math such as `now-10d/d`
#[derive(Debug, Clone)]
pub struct DateRangeAgg {
    pub value: AggValue<Date>,
    pub ranges: Vec<AggRange<String>>,
    pub format: Option<String>,
    pub time_zone: Option<String>,
    pub keyed: Option<bool>,
    pub aggs: Aggs,
}

impl DateRangeAgg {
    pub fn new(value: AggValue<Date>) -> Self {
        Self {
            value,
            ranges: Vec::new(),
            format: None,
            time_zone: None,
            keyed: None,
            aggs: Aggs::new(),
        }
    }

    pub fn range(mut self, range: AggRange<String>) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = Some(keyed);
        self
    }
}

impl NamedExpression for DateRangeAgg {
    fn name(&self) -> &str {
        "date_range"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        self.value.write(obj);
        obj.field_opt("format", self.format.as_deref())
            .field_opt("time_zone", self.time_zone.as_deref());
        obj.array("ranges", |a| {
            for range in &self.ranges {
                range.write(a, |v| Value::from(v.as_str()));
            }
        });
        obj.field_opt("keyed", self.keyed);
    }
}

impl Aggregation for DateRangeAgg {
    type Result = RangeResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<RangeResult> {
        RangeResult::decode(reader, &self.aggs, &self.ranges)
    }
}

// ===================================================================
// single bucket: filter / global / nested / reverse_nested
// ===================================================================

#[derive(Debug, Clone)]
pub struct SingleBucketResult {
    pub doc_count: i64,
    pub aggs: AggResults,
}

impl SingleBucketResult {
    fn decode(reader: &ObjectReader<'_>, aggs: &Aggs) -> Result<Self> {
        Ok(Self {
            doc_count: reader.long("doc_count")?,
            aggs: decode_sub_aggs(aggs, reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FilterAgg {
    pub filter: QueryExpression,
    pub aggs: Aggs,
}

impl FilterAgg {
    pub fn new(filter: impl Into<QueryExpression>) -> Self {
        Self {
            filter: filter.into(),
            aggs: Aggs::new(),
        }
    }
}

impl NamedExpression for FilterAgg {
    fn name(&self) -> &str {
        "filter"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        reduced_or_match_all(&self.filter).serialize(obj, compiler);
    }
}

impl Aggregation for FilterAgg {
    type Result = SingleBucketResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<SingleBucketResult> {
        SingleBucketResult::decode(reader, &self.aggs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalAgg {
    pub aggs: Aggs,
}

impl GlobalAgg {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NamedExpression for GlobalAgg {
    fn name(&self) -> &str {
        "global"
    }

    fn body(&self, _obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {}
}

impl Aggregation for GlobalAgg {
    type Result = SingleBucketResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<SingleBucketResult> {
        SingleBucketResult::decode(reader, &self.aggs)
    }
}

#[derive(Debug, Clone)]
pub struct NestedAgg {
    pub path: String,
    pub aggs: Aggs,
}

impl NestedAgg {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            aggs: Aggs::new(),
        }
    }
}

impl NamedExpression for NestedAgg {
    fn name(&self) -> &str {
        "nested"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field("path", self.path.as_str());
    }
}

impl Aggregation for NestedAgg {
    type Result = SingleBucketResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<SingleBucketResult> {
        SingleBucketResult::decode(reader, &self.aggs)
    }
}

/// Joins back from nested documents to the root (or to `path`)
#[derive(Debug, Clone, Default)]
pub struct ReverseNestedAgg {
    pub path: Option<String>,
    pub aggs: Aggs,
}

impl ReverseNestedAgg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl NamedExpression for ReverseNestedAgg {
    fn name(&self) -> &str {
        "reverse_nested"
    }

    fn body(&self, obj: &mut ObjectBuilder, _compiler: &SearchQueryCompiler) {
        obj.field_opt("path", self.path.as_deref());
    }
}

impl Aggregation for ReverseNestedAgg {
    type Result = SingleBucketResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<SingleBucketResult> {
        SingleBucketResult::decode(reader, &self.aggs)
    }
}

// ===================================================================
// filters
// ===================================================================

#[derive(Debug, Clone)]
enum FilterSet {
    Named(Vec<(String, QueryExpression)>),
    Anonymous(Vec<QueryExpression>),
}

#[derive(Debug, Clone)]
pub struct FiltersBucket {
    pub key: Option<String>,
    pub doc_count: i64,
    pub aggs: AggResults,
}

/// Buckets of a `filters` aggregation. Named buckets follow the order the
/// filters were declared in, the other bucket comes last.
#[derive(Debug, Clone)]
pub struct FiltersResult {
    pub buckets: Vec<FiltersBucket>,
}

impl FiltersResult {
    pub fn get(&self, key: &str) -> Option<&FiltersBucket> {
        self.buckets.iter().find(|b| b.key.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone)]
pub struct FiltersAgg {
    filters: FilterSet,
    pub other_bucket_key: Option<String>,
    pub aggs: Aggs,
}

impl FiltersAgg {
    /// Buckets come back keyed by filter name
    pub fn named() -> Self {
        Self {
            filters: FilterSet::Named(Vec::new()),
            other_bucket_key: None,
            aggs: Aggs::new(),
        }
    }

    /// Buckets come back positionally
    pub fn anonymous() -> Self {
        Self {
            filters: FilterSet::Anonymous(Vec::new()),
            other_bucket_key: None,
            aggs: Aggs::new(),
        }
    }

    /// Adds a filter; `name` is ignored by anonymous filter sets
    pub fn filter(mut self, name: impl Into<String>, query: impl Into<QueryExpression>) -> Self {
        match &mut self.filters {
            FilterSet::Named(filters) => filters.push((name.into(), query.into())),
            FilterSet::Anonymous(filters) => filters.push(query.into()),
        }
        self
    }

    pub fn other_bucket_key(mut self, key: impl Into<String>) -> Self {
        self.other_bucket_key = Some(key.into());
        self
    }

    fn decode_bucket(&self, key: Option<String>, bucket: &ObjectReader<'_>) -> Result<FiltersBucket> {
        Ok(FiltersBucket {
            key,
            doc_count: bucket.long("doc_count")?,
            aggs: decode_sub_aggs(&self.aggs, bucket)?,
        })
    }
}

impl NamedExpression for FiltersAgg {
    fn name(&self) -> &str {
        "filters"
    }

    fn body(&self, obj: &mut ObjectBuilder, compiler: &SearchQueryCompiler) {
        match &self.filters {
            FilterSet::Named(filters) => {
                obj.obj("filters", |f| {
                    for (name, query) in filters {
                        f.obj(name.as_str(), |q| reduced_or_match_all(query).serialize(q, compiler));
                    }
                });
            }
            FilterSet::Anonymous(filters) => {
                obj.array("filters", |a| {
                    for query in filters {
                        a.obj(|q| reduced_or_match_all(query).serialize(q, compiler));
                    }
                });
            }
        }
        obj.field_opt("other_bucket_key", self.other_bucket_key.as_deref());
    }
}

impl Aggregation for FiltersAgg {
    type Result = FiltersResult;

    fn sub_aggs(&self) -> Option<&Aggs> {
        Some(&self.aggs)
    }

    fn decode(&self, reader: &ObjectReader<'_>) -> Result<FiltersResult> {
        let buckets = match reader.value("buckets")? {
            Value::Object(_) => {
                let names: Vec<&str> = match &self.filters {
                    FilterSet::Named(filters) => filters.iter().map(|(n, _)| n.as_str()).collect(),
                    FilterSet::Anonymous(_) => Vec::new(),
                };
                let objects = reader.obj("buckets")?;
                let mut buckets = names
                    .iter()
                    .map(|name| self.decode_bucket(Some(name.to_string()), &objects.obj(name)?))
                    .collect::<Result<Vec<_>>>()?;
                if let Some(other) = &self.other_bucket_key {
                    if let Some(bucket) = objects.obj_opt(other)? {
                        buckets.push(self.decode_bucket(Some(other.clone()), &bucket)?);
                    }
                }
                buckets
            }
            _ => decode_buckets(reader, |_, bucket| self.decode_bucket(None, bucket))?,
        };
        Ok(FiltersResult { buckets })
    }
}

impl_bucket!(
    [K] KeyedBucket<K>,
    [K] SignificantTermsBucket<K>,
    [] HistogramBucket,
    [] DateHistogramBucket,
    [] RangeBucket,
    [] FiltersBucket,
    [] SingleBucketResult,
);

sub_aggs!(
    [T: FieldType] TermsAgg<T>,
    [T: FieldType] SignificantTermsAgg<T>,
    [T: FieldType] HistogramAgg<T>,
    [] DateHistogramAgg,
    [T: FieldType] RangeAgg<T>,
    [] DateRangeAgg,
    [] FilterAgg,
    [] FiltersAgg,
    [] GlobalAgg,
    [] NestedAgg,
    [] ReverseNestedAgg,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggs::{AvgAgg, ValueResult};
    use crate::query::{Order, Term};
    use crate::types::{Boolean, Double, Field, Keyword};
    use chrono::TimeZone;
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
    // Terms
    // ===================================================================

    #[test]
    fn test_terms_body_and_decode() {
        let genre = Field::new("genre", Keyword);
        let agg = TermsAgg::new(AggValue::field(&genre))
            .size(100)
            .missing("unknown".to_string());
        let text = serde_json::to_string(&body(&agg)).unwrap();
        assert_eq!(
            text,
            r#"{"terms":{"field":"genre","size":100,"missing":"unknown"}}"#
        );

        let result = decode(
            &agg,
            json!({
                "buckets": [{"key": "comedy", "doc_count": 83}],
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 0
            }),
        )
        .unwrap();
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].key, "comedy");
        assert_eq!(result.buckets[0].doc_count, 83);
    }

    #[test]
    fn test_terms_keys_use_field_type() {
        let published = Field::new("published", Boolean);
        let agg = TermsAgg::new(AggValue::field(&published));
        let result = decode(
            &agg,
            json!({"buckets": [
                {"key": 1, "key_as_string": "true", "doc_count": 5},
                {"key": 0, "key_as_string": "false", "doc_count": 2}
            ]}),
        )
        .unwrap();
        let keys: Vec<bool> = result.buckets.iter().map(|b| b.key).collect();
        assert_eq!(keys, vec![true, false]);
    }

    #[test]
    fn test_terms_order_and_sub_aggs() {
        let genre = Field::new("genre", Keyword);
        let rank = Field::new("rank", Double);
        let mut agg = TermsAgg::new(AggValue::field(&genre))
            .order(BucketsOrder::new().by("avg_rank", Order::Desc));
        let avg_key = agg.sub_agg("avg_rank", AvgAgg::new(AggValue::field(&rank)));

        assert_eq!(
            body(&agg),
            json!({"terms": {"field": "genre", "order": {"avg_rank": "desc"}}})
        );

        let result = decode(
            &agg,
            json!({"buckets": [{"key": "drama", "doc_count": 3, "avg_rank": {"value": 7.5}}]}),
        )
        .unwrap();
        let avg: &ValueResult = result.buckets[0].aggs.get(&avg_key).unwrap();
        assert_eq!(avg.value, Some(7.5));
    }

    // ===================================================================
    // Range
    // ===================================================================

    #[test]
    fn test_range_dual_shape() {
        let price = Field::new("price", Double);
        let agg = RangeAgg::new(AggValue::field(&price))
            .range(AggRange::keyed("cheap", None, Some(100.0)))
            .range(AggRange::keyed("pricey", Some(100.0), None));

        assert_eq!(
            body(&agg),
            json!({"range": {
                "field": "price",
                "ranges": [{"key": "cheap", "to": 100.0}, {"key": "pricey", "from": 100.0}]
            }})
        );

        let listed = decode(
            &agg,
            json!({"buckets": [
                {"key": "cheap", "to": 100.0, "doc_count": 3},
                {"key": "pricey", "from": 100.0, "doc_count": 5}
            ]}),
        )
        .unwrap();
        let keyed = decode(
            &agg,
            json!({"buckets": {
                "cheap": {"to": 100.0, "doc_count": 3},
                "pricey": {"from": 100.0, "doc_count": 5}
            }}),
        )
        .unwrap();

        for result in [&listed, &keyed] {
            let cheap = result.get("cheap").unwrap();
            assert_eq!((cheap.from, cheap.to, cheap.doc_count), (None, Some(100.0), 3));
            let pricey = result.get("pricey").unwrap();
            assert_eq!((pricey.from, pricey.to, pricey.doc_count), (Some(100.0), None, 5));
        }
    }

    #[test]
    fn test_keyed_range_buckets_follow_declared_order() {
        let price = Field::new("price", Double);
        let agg = RangeAgg::new(AggValue::field(&price))
            .range(AggRange::keyed("cheap", None, Some(50.0)))
            .range(AggRange::keyed("mid", Some(50.0), Some(100.0)))
            .range(AggRange::new(Some(100.0), None))
            .keyed(true);

        let result = decode(
            &agg,
            json!({"buckets": {
                "100.0-*": {"from": 100.0, "doc_count": 1},
                "mid": {"from": 50.0, "to": 100.0, "doc_count": 4},
                "cheap": {"to": 50.0, "doc_count": 2}
            }}),
        )
        .unwrap();
        assert_eq!(
            result
                .buckets
                .iter()
                .map(|b| b.key.as_deref())
                .collect::<Vec<_>>(),
            vec![Some("cheap"), Some("mid"), Some("100.0-*")]
        );
    }

    #[test]
    fn test_date_range_body() {
        let created = Field::new("created", Date);
        let agg = DateRangeAgg::new(AggValue::field(&created))
            .format("yyyy-MM-dd")
            .range(AggRange::new(Some("now-10d/d".to_string()), None));
        assert_eq!(
            body(&agg),
            json!({"date_range": {
                "field": "created",
                "format": "yyyy-MM-dd",
                "ranges": [{"from": "now-10d/d"}]
            }})
        );
    }

    // ===================================================================
    // Histograms
    // ===================================================================

    #[test]
    fn test_histogram_both_shapes() {
        let price = Field::new("price", Double);
        let agg = HistogramAgg::new(AggValue::field(&price), 50.0).min_doc_count(1);
        assert_eq!(
            body(&agg),
            json!({"histogram": {"field": "price", "interval": 50.0, "min_doc_count": 1}})
        );

        let listed = decode(
            &agg,
            json!({"buckets": [{"key": 0.0, "doc_count": 2}, {"key": 50.0, "doc_count": 4}]}),
        )
        .unwrap();
        let keyed = decode(
            &agg,
            json!({"buckets": {
                "0.0": {"key": 0.0, "doc_count": 2},
                "50.0": {"key": 50.0, "doc_count": 4}
            }}),
        )
        .unwrap();
        let pairs = |r: &HistogramResult<HistogramBucket>| -> Vec<(f64, i64)> {
            r.buckets.iter().map(|b| (b.key, b.doc_count)).collect()
        };
        assert_eq!(pairs(&listed), vec![(0.0, 2), (50.0, 4)]);
        assert_eq!(pairs(&listed), pairs(&keyed));
    }

    #[test]
    fn test_date_histogram_keys_are_dates() {
        let created = Field::new("created", Date);
        let agg = DateHistogramAgg::calendar(AggValue::field(&created), "1d").time_zone("UTC");
        assert_eq!(
            body(&agg),
            json!({"date_histogram": {
                "field": "created",
                "calendar_interval": "1d",
                "time_zone": "UTC"
            }})
        );

        let result = decode(
            &agg,
            json!({"buckets": [{"key_as_string": "2024-03-01", "key": 1709251200000i64, "doc_count": 9}]}),
        )
        .unwrap();
        assert_eq!(
            result.buckets[0].key,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    // ===================================================================
    // Filters
    // ===================================================================

    #[test]
    fn test_filters_keep_declaration_order() {
        let agg = FiltersAgg::named()
            .filter("errors", Term::new("level", "error"))
            .filter("warnings", Term::new("level", "warn"))
            .other_bucket_key("rest");

        assert_eq!(
            body(&agg),
            json!({"filters": {
                "filters": {
                    "errors": {"term": {"level": "error"}},
                    "warnings": {"term": {"level": "warn"}}
                },
                "other_bucket_key": "rest"
            }})
        );

        let result = decode(
            &agg,
            json!({"buckets": {
                "rest": {"doc_count": 1},
                "warnings": {"doc_count": 7},
                "errors": {"doc_count": 2}
            }}),
        )
        .unwrap();
        let keys: Vec<&str> = result
            .buckets
            .iter()
            .filter_map(|b| b.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["errors", "warnings", "rest"]);
        assert_eq!(result.get("warnings").unwrap().doc_count, 7);
    }

    #[test]
    fn test_anonymous_filters_are_positional() {
        let agg = FiltersAgg::anonymous()
            .filter("", Term::new("level", "error"))
            .filter("", Term::new("level", "warn"));
        let result = decode(
            &agg,
            json!({"buckets": [{"doc_count": 2}, {"doc_count": 7}]}),
        )
        .unwrap();
        let counts: Vec<i64> = result.buckets.iter().map(|b| b.doc_count).collect();
        assert_eq!(counts, vec![2, 7]);
    }

    // ===================================================================
    // Single bucket
    // ===================================================================

    #[test]
    fn test_nested_with_reverse_nested() {
        let mut nested = NestedAgg::new("comments");
        let mut reverse = ReverseNestedAgg::new();
        let posts_key = reverse.sub_agg(
            "posts",
            TermsAgg::new(AggValue::field(&Field::new("tag", Keyword))),
        );
        let back_key = nested.sub_agg("back", reverse);

        assert_eq!(
            body(&nested),
            json!({"nested": {"path": "comments"}})
        );

        let result = decode(
            &nested,
            json!({"doc_count": 12, "back": {"doc_count": 4, "posts": {"buckets": []}}}),
        )
        .unwrap();
        assert_eq!(result.doc_count, 12);
        let back = result.aggs.get(&back_key).unwrap();
        assert_eq!(back.doc_count(), 4);
        assert!(back.aggs.get(&posts_key).unwrap().buckets.is_empty());
    }

    #[test]
    fn test_filter_and_global_bodies() {
        assert_eq!(
            body(&FilterAgg::new(Term::new("lang", "en"))),
            json!({"filter": {"term": {"lang": "en"}}})
        );
        assert_eq!(body(&GlobalAgg::new()), json!({"global": {}}));
        assert_eq!(
            decode(&GlobalAgg::new(), json!({"doc_count": 100})).unwrap().doc_count,
            100
        );
    }
}
