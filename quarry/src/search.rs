//! Search query builder, prepared snapshots and decoded results
//!
//! [`SearchQuery`] is a mutable builder. [`SearchQuery::prepare`] takes an
//! immutable [`PreparedSearchQuery`] snapshot that can be shared across
//! threads and compiled any number of times; later edits of the builder are
//! not observed by the snapshot.

use crate::aggs::{AggKey, AggResults, Aggregation, Aggs};
use crate::error::Error;
use crate::expression::Script;
use crate::json::ObjectReader;
use crate::query::{
    NodeHandle, NodeIndex, NodeKind, QueryExpression, QueryExpressionNode, QueryRescore, Sort,
    SourceFilter,
};
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Decodes a document from the raw hit object. The whole hit is passed so
/// that meta fields stay reachable.
pub struct DocSource<S> {
    decode: Arc<dyn Fn(&ObjectReader<'_>) -> Result<Option<S>> + Send + Sync>,
}

impl<S> DocSource<S> {
    pub fn new(
        decode: impl Fn(&ObjectReader<'_>) -> Result<Option<S>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            decode: Arc::new(decode),
        }
    }

    pub fn decode(&self, hit: &ObjectReader<'_>) -> Result<Option<S>> {
        (self.decode)(hit)
    }
}

impl DocSource<Value> {
    /// `_source` as raw JSON
    pub fn raw() -> Self {
        Self::new(|hit| Ok(hit.value_opt("_source").cloned()))
    }
}

impl<S: DeserializeOwned> DocSource<S> {
    /// `_source` deserialized with serde
    pub fn serde() -> Self {
        Self::new(|hit| match hit.value_opt("_source") {
            Some(source) => Ok(Some(S::deserialize(source)?)),
            None => Ok(None),
        })
    }
}

impl<S> Clone for DocSource<S> {
    fn clone(&self) -> Self {
        Self {
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<S> fmt::Debug for DocSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocSource")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTotalHits {
    Enabled(bool),
    UpTo(u64),
}

impl TrackTotalHits {
    pub(crate) fn to_value(self) -> Value {
        match self {
            TrackTotalHits::Enabled(enabled) => Value::Bool(enabled),
            TrackTotalHits::UpTo(limit) => Value::from(limit),
        }
    }
}

/// URL parameters of a search request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub routing: Option<String>,
    pub preference: Option<String>,
    pub search_type: Option<String>,
    pub request_cache: Option<bool>,
    pub scroll: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl SearchParams {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((name.to_string(), value));
            }
        };
        push("routing", self.routing.clone());
        push("preference", self.preference.clone());
        push("search_type", self.search_type.clone());
        push("request_cache", self.request_cache.map(|v| v.to_string()));
        push("scroll", self.scroll.clone());
        pairs.extend(self.extra.iter().cloned());
        pairs
    }
}

/// Mutable search builder. Not meant to be edited while a compile that
/// borrows it is in progress; take a [`PreparedSearchQuery`] instead.
#[derive(Debug)]
pub struct SearchQuery<S = Value> {
    pub(crate) query: Option<QueryExpression>,
    pub(crate) filters: Vec<QueryExpression>,
    pub(crate) post_filters: Vec<QueryExpression>,
    pub(crate) aggs: Aggs,
    pub(crate) rescores: Vec<QueryRescore>,
    pub(crate) sort: Vec<Sort>,
    pub(crate) track_scores: Option<bool>,
    pub(crate) track_total_hits: Option<TrackTotalHits>,
    pub(crate) source: Option<SourceFilter>,
    pub(crate) fields: Vec<String>,
    pub(crate) docvalue_fields: Vec<String>,
    pub(crate) stored_fields: Vec<String>,
    pub(crate) script_fields: Vec<(String, Script)>,
    pub(crate) size: Option<u64>,
    pub(crate) from: Option<u64>,
    pub(crate) terminate_after: Option<u64>,
    pub(crate) ext: Map<String, Value>,
    pub(crate) params: SearchParams,
    pub(crate) doc_source: DocSource<S>,
}

impl<S> Clone for SearchQuery<S> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            filters: self.filters.clone(),
            post_filters: self.post_filters.clone(),
            aggs: self.aggs.clone(),
            rescores: self.rescores.clone(),
            sort: self.sort.clone(),
            track_scores: self.track_scores,
            track_total_hits: self.track_total_hits,
            source: self.source.clone(),
            fields: self.fields.clone(),
            docvalue_fields: self.docvalue_fields.clone(),
            stored_fields: self.stored_fields.clone(),
            script_fields: self.script_fields.clone(),
            size: self.size,
            from: self.from,
            terminate_after: self.terminate_after,
            ext: self.ext.clone(),
            params: self.params.clone(),
            doc_source: self.doc_source.clone(),
        }
    }
}

impl SearchQuery<Value> {
    /// Search whose hits keep `_source` as raw JSON
    pub fn new() -> Self {
        Self::with_source(DocSource::raw())
    }
}

impl Default for SearchQuery<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SearchQuery<S> {
    pub fn with_source(doc_source: DocSource<S>) -> Self {
        Self {
            query: None,
            filters: Vec::new(),
            post_filters: Vec::new(),
            aggs: Aggs::new(),
            rescores: Vec::new(),
            sort: Vec::new(),
            track_scores: None,
            track_total_hits: None,
            source: None,
            fields: Vec::new(),
            docvalue_fields: Vec::new(),
            stored_fields: Vec::new(),
            script_fields: Vec::new(),
            size: None,
            from: None,
            terminate_after: None,
            ext: Map::new(),
            params: SearchParams::default(),
            doc_source,
        }
    }

    pub fn query(&mut self, query: impl Into<QueryExpression>) -> &mut Self {
        self.query = Some(query.into());
        self
    }

    pub fn clear_query(&mut self) -> &mut Self {
        self.query = None;
        self
    }

    /// Non-scoring filter, combined with the main query under `bool.filter`
    pub fn filter(&mut self, query: impl Into<QueryExpression>) -> &mut Self {
        self.filters.push(query.into());
        self
    }

    pub fn post_filter(&mut self, query: impl Into<QueryExpression>) -> &mut Self {
        self.post_filters.push(query.into());
        self
    }

    pub fn aggregate<A: Aggregation>(&mut self, name: impl Into<String>, agg: A) -> AggKey<A::Result> {
        self.aggs.add(name, agg)
    }

    pub fn rescore(&mut self, rescore: QueryRescore) -> &mut Self {
        self.rescores.push(rescore);
        self
    }

    pub fn sort(&mut self, sort: Sort) -> &mut Self {
        self.sort.push(sort);
        self
    }

    pub fn track_scores(&mut self, track: bool) -> &mut Self {
        self.track_scores = Some(track);
        self
    }

    /// Ignored by engines that do not know `track_total_hits`
    pub fn track_total_hits(&mut self, track: TrackTotalHits) -> &mut Self {
        self.track_total_hits = Some(track);
        self
    }

    pub fn source(&mut self, source: SourceFilter) -> &mut Self {
        self.source = Some(source);
        self
    }

    pub fn fields<I, F>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn docvalue_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.docvalue_fields.push(field.into());
        self
    }

    pub fn stored_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.stored_fields.push(field.into());
        self
    }

    pub fn script_field(&mut self, name: impl Into<String>, script: Script) -> &mut Self {
        self.script_fields.push((name.into(), script));
        self
    }

    pub fn size(&mut self, size: u64) -> &mut Self {
        self.size = Some(size);
        self
    }

    pub fn from(&mut self, from: u64) -> &mut Self {
        self.from = Some(from);
        self
    }

    pub fn terminate_after(&mut self, count: u64) -> &mut Self {
        self.terminate_after = Some(count);
        self
    }

    /// Plugin section under `ext`
    pub fn ext(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.ext.insert(name.into(), value.into());
        self
    }

    pub fn routing(&mut self, routing: impl Into<String>) -> &mut Self {
        self.params.routing = Some(routing.into());
        self
    }

    pub fn preference(&mut self, preference: impl Into<String>) -> &mut Self {
        self.params.preference = Some(preference.into());
        self
    }

    pub fn search_type(&mut self, search_type: impl Into<String>) -> &mut Self {
        self.params.search_type = Some(search_type.into());
        self
    }

    pub fn request_cache(&mut self, enabled: bool) -> &mut Self {
        self.params.request_cache = Some(enabled);
        self
    }

    pub fn scroll(&mut self, keep_alive: impl Into<String>) -> &mut Self {
        self.params.scroll = Some(keep_alive.into());
        self
    }

    /// Free-form URL parameter
    pub fn param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.extra.push((name.into(), value.into()));
        self
    }

    pub fn get_query(&self) -> Option<&QueryExpression> {
        self.query.as_ref()
    }

    pub fn get_filters(&self) -> &[QueryExpression] {
        &self.filters
    }

    pub fn get_post_filters(&self) -> &[QueryExpression] {
        &self.post_filters
    }

    pub fn get_aggs(&self) -> &Aggs {
        &self.aggs
    }

    pub fn get_params(&self) -> &SearchParams {
        &self.params
    }

    fn roots(&self) -> impl Iterator<Item = &QueryExpression> {
        self.query
            .iter()
            .chain(&self.filters)
            .chain(&self.post_filters)
            .chain(self.rescores.iter().map(|r| &r.query))
    }

    /// Handle index over every query slot of this search
    pub fn node_index(&self) -> Result<NodeIndex> {
        NodeIndex::collect(self.roots())
    }

    pub fn find_node<T: NodeKind>(&self, handle: &NodeHandle<T>) -> Result<QueryExpressionNode<T>> {
        self.node_index()?.find(handle)
    }

    /// Swaps the node with `node`'s handle for `node`'s value, wherever it
    /// sits in the query, filters, post filters or rescorers
    pub fn rewrite<T: NodeKind>(&mut self, node: &QueryExpressionNode<T>) -> Result<&mut Self> {
        if !self.node_index()?.contains(node.handle()) {
            return Err(Error::HandleNotFound(node.handle().name().to_string()));
        }
        let slot = node.to_slot();
        self.query = self.query.as_ref().map(|q| q.rewrite(&slot));
        self.filters = self.filters.iter().map(|q| q.rewrite(&slot)).collect();
        self.post_filters = self.post_filters.iter().map(|q| q.rewrite(&slot)).collect();
        self.rescores = self.rescores.iter().map(|r| r.rewrite(&slot)).collect();
        Ok(self)
    }

    /// Immutable snapshot for compilation
    pub fn prepare(&self) -> PreparedSearchQuery<S> {
        PreparedSearchQuery {
            inner: Arc::new(self.clone()),
        }
    }
}

/// Frozen copy of a [`SearchQuery`], cheap to clone and share
#[derive(Debug)]
pub struct PreparedSearchQuery<S = Value> {
    inner: Arc<SearchQuery<S>>,
}

impl<S> Clone for PreparedSearchQuery<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Deref for PreparedSearchQuery<S> {
    type Target = SearchQuery<S>;

    fn deref(&self) -> &SearchQuery<S> {
        &self.inner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalRelation {
    Eq,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalHits {
    pub value: i64,
    pub relation: TotalRelation,
}

impl TotalHits {
    /// Legacy engines send a bare integer, newer ones `{value, relation}`
    fn decode(hits: &ObjectReader<'_>) -> Result<Option<TotalHits>> {
        match hits.value_opt("total") {
            None => Ok(None),
            Some(Value::Object(_)) => {
                let total = hits.obj("total")?;
                let relation = match total.string_opt("relation")? {
                    None | Some("eq") => TotalRelation::Eq,
                    Some("gte") => TotalRelation::Gte,
                    Some(_) => {
                        return Err(Error::invalid_type(total.path_of("relation"), "eq or gte"))
                    }
                };
                Ok(Some(TotalHits {
                    value: total.long("value")?,
                    relation,
                }))
            }
            Some(_) => Ok(Some(TotalHits {
                value: hits.long("total")?,
                relation: TotalRelation::Eq,
            })),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit<S> {
    pub index: String,
    pub doc_type: String,
    pub id: String,
    pub routing: Option<String>,
    pub version: Option<i64>,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
    pub score: Option<f64>,
    pub source: Option<S>,
    pub fields: HashMap<String, Vec<Value>>,
    /// Raw sort values; `None` when the hit carries no sort values
    pub sort: Option<Vec<Value>>,
}

impl<S> SearchHit<S> {
    pub fn decode(hit: &ObjectReader<'_>, doc_source: &DocSource<S>) -> Result<Self> {
        let fields = match hit.obj_opt("fields")? {
            Some(fields) => fields
                .keys()
                .map(|name| {
                    let values = fields.array(name)?.values().to_vec();
                    Ok((name.to_string(), values))
                })
                .collect::<Result<HashMap<_, _>>>()?,
            None => HashMap::new(),
        };
        let sort = hit
            .array_opt("sort")?
            .filter(|sort| !sort.is_empty())
            .map(|sort| sort.values().to_vec());

        Ok(Self {
            index: hit.string("_index")?.to_string(),
            doc_type: hit.string_opt("_type")?.unwrap_or("_doc").to_string(),
            id: hit.string("_id")?.to_string(),
            routing: hit.string_opt("_routing")?.map(str::to_string),
            version: hit.long_opt("_version")?,
            seq_no: hit.long_opt("_seq_no")?,
            primary_term: hit.long_opt("_primary_term")?,
            score: hit.double_opt("_score")?,
            source: doc_source.decode(hit)?,
            fields,
            sort,
        })
    }
}

/// The `hits` section of a search response
#[derive(Debug, Clone)]
pub struct SearchHits<S> {
    pub total: Option<TotalHits>,
    pub max_score: Option<f64>,
    pub hits: Vec<SearchHit<S>>,
}

impl<S> SearchHits<S> {
    pub fn decode(hits: &ObjectReader<'_>, doc_source: &DocSource<S>) -> Result<Self> {
        let items = hits
            .array("hits")?
            .objs()
            .map(|hit| SearchHit::decode(&hit?, doc_source))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            total: TotalHits::decode(hits)?,
            max_score: hits.double_opt("max_score")?,
            hits: items,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchQueryResult<S> {
    pub took: i64,
    pub timed_out: bool,
    pub scroll_id: Option<String>,
    pub hits: SearchHits<S>,
    pub aggs: AggResults,
}

impl<S> SearchQueryResult<S> {
    pub fn decode(response: &ObjectReader<'_>, query: &PreparedSearchQuery<S>) -> Result<Self> {
        let aggs = match response.obj_opt("aggregations")? {
            Some(aggregations) => query.aggs.decode(&aggregations)?,
            None => AggResults::default(),
        };
        Ok(Self {
            took: response.long("took")?,
            timed_out: response.boolean_opt("timed_out")?.unwrap_or(false),
            scroll_id: response.string_opt("_scroll_id")?.map(str::to_string),
            hits: SearchHits::decode(&response.obj("hits")?, &query.doc_source)?,
            aggs,
        })
    }

    pub fn agg<R: std::any::Any>(&self, key: &AggKey<R>) -> Option<&R> {
        self.aggs.get(key)
    }

    pub fn total(&self) -> Option<i64> {
        self.hits.total.map(|t| t.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Bool, BoolNode, Term};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        title: String,
    }

    fn reader(value: &Value) -> ObjectReader<'_> {
        ObjectReader::from_value(value).unwrap()
    }

    // ===================================================================
    // Hits
    // ===================================================================

    #[test]
    fn test_total_hits_both_shapes() {
        let legacy = json!({"total": 12, "max_score": 1.0, "hits": []});
        let modern = json!({"total": {"value": 10000, "relation": "gte"}, "max_score": null, "hits": []});

        let legacy = SearchHits::decode(&reader(&legacy), &DocSource::raw()).unwrap();
        assert_eq!(
            legacy.total,
            Some(TotalHits {
                value: 12,
                relation: TotalRelation::Eq
            })
        );
        assert_eq!(legacy.max_score, Some(1.0));

        let modern = SearchHits::decode(&reader(&modern), &DocSource::raw()).unwrap();
        assert_eq!(
            modern.total,
            Some(TotalHits {
                value: 10000,
                relation: TotalRelation::Gte
            })
        );
        assert_eq!(modern.max_score, None);
    }

    #[test]
    fn test_hit_meta_fields() {
        let hit = json!({
            "_index": "posts", "_id": "1", "_routing": "u1", "_version": 3,
            "_seq_no": 10, "_primary_term": 1, "_score": 0.5,
            "_source": {"title": "Hello"},
            "fields": {"tags": ["a", "b"]},
            "sort": []
        });
        let hit = SearchHit::decode(&reader(&hit), &DocSource::<Post>::serde()).unwrap();
        assert_eq!(hit.doc_type, "_doc");
        assert_eq!(hit.routing.as_deref(), Some("u1"));
        assert_eq!(hit.version, Some(3));
        assert_eq!(hit.source, Some(Post { title: "Hello".into() }));
        assert_eq!(hit.fields["tags"], vec![json!("a"), json!("b")]);
        assert_eq!(hit.sort, None);
    }

    #[test]
    fn test_doc_source_sees_whole_hit() {
        let source = DocSource::new(|hit: &ObjectReader<'_>| Ok(Some(hit.string("_id")?.to_string())));
        let hit = json!({"_index": "posts", "_id": "42", "_type": "post", "sort": [5, "x"]});
        let hit = SearchHit::decode(&reader(&hit), &source).unwrap();
        assert_eq!(hit.source.as_deref(), Some("42"));
        assert_eq!(hit.doc_type, "post");
        assert_eq!(hit.sort, Some(vec![json!(5), json!("x")]));
    }

    // ===================================================================
    // Builder
    // ===================================================================

    #[test]
    fn test_prepared_snapshot_ignores_later_edits() {
        let mut search = SearchQuery::new();
        search.filter(Term::new("status", 0)).size(10);
        let prepared = search.prepare();
        search.filter(Term::new("rank", 1)).size(20);

        assert_eq!(prepared.get_filters().len(), 1);
        assert_eq!(prepared.size, Some(10));
        assert_eq!(search.get_filters().len(), 2);
    }

    #[test]
    fn test_prepared_query_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PreparedSearchQuery<Value>>();
    }

    #[test]
    fn test_rewrite_in_filters() {
        let handle: NodeHandle<Bool> = NodeHandle::new("extra");
        let mut search = SearchQuery::new();
        search.filter(BoolNode::new(&handle, Bool::new()));

        let mut node = search.find_node(&handle).unwrap();
        node.replace(Bool::new().must(Term::new("lang", "en")));
        search.rewrite(&node).unwrap();

        let found = search.find_node(&handle).unwrap();
        assert_eq!(found.get().must.len(), 1);
    }

    #[test]
    fn test_rewrite_unknown_handle() {
        let handle: NodeHandle<Bool> = NodeHandle::new("ghost");
        let mut search = SearchQuery::new();
        let node = BoolNode::new(&handle, Bool::new());
        assert!(matches!(
            search.rewrite(&node),
            Err(Error::HandleNotFound(ref name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_search_params() {
        let mut search = SearchQuery::new();
        search
            .routing("user-1")
            .request_cache(false)
            .param("allow_partial_search_results", "true");
        assert_eq!(
            search.get_params().to_pairs(),
            vec![
                ("routing".to_string(), "user-1".to_string()),
                ("request_cache".to_string(), "false".to_string()),
                ("allow_partial_search_results".to_string(), "true".to_string()),
            ]
        );
    }
}
