//! Search, count and multi-search compilation

use super::{index_path, ErrorCause, Method, Request};
use crate::expression::NamedExpression;
use crate::features::FeatureSet;
use crate::json::{ObjectBuilder, ObjectReader};
use crate::query::{Bool, QueryExpression};
use crate::search::{PreparedSearchQuery, SearchParams, SearchQuery, SearchQueryResult};
use crate::{Error, Result};
use serde_json::Value;

/// Compiles search requests and decodes their responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchQueryCompiler {
    features: FeatureSet,
}

impl SearchQueryCompiler {
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Main query combined with the non-scoring filters
    ///
    /// With filters the result is `bool {must: [query], filter: filters}`,
    /// reduced. A lone filter without a main query is emitted on its own.
    pub fn filtered_query<S>(&self, search: &SearchQuery<S>) -> Option<QueryExpression> {
        let query = search.query.as_ref().and_then(QueryExpression::reduce);
        match (query, search.filters.as_slice()) {
            (query, []) => query,
            (None, [single]) => single.reduce(),
            (query, filters) => Bool {
                must: query.into_iter().collect(),
                filter: filters.to_vec(),
                ..Bool::default()
            }
            .reduce(),
        }
    }

    fn post_filter<S>(&self, search: &SearchQuery<S>) -> Option<QueryExpression> {
        match search.post_filters.as_slice() {
            [] => None,
            [single] => single.reduce(),
            many => Bool {
                filter: many.to_vec(),
                ..Bool::default()
            }
            .reduce(),
        }
    }

    /// Request body of a search
    pub fn search_body<S>(&self, search: &SearchQuery<S>) -> Value {
        let mut body = ObjectBuilder::new();

        if let Some(query) = self.filtered_query(search) {
            body.obj("query", |q| query.serialize(q, self));
        }
        if let Some(post_filter) = self.post_filter(search) {
            body.obj("post_filter", |q| post_filter.serialize(q, self));
        }
        if !search.aggs.is_empty() {
            body.obj("aggs", |a| search.aggs.write(a, self));
        }
        if !search.rescores.is_empty() {
            body.array("rescore", |a| {
                for rescore in &search.rescores {
                    a.obj(|r| rescore.write(r, self));
                }
            });
        }
        if !search.sort.is_empty() {
            body.array("sort", |a| {
                for sort in &search.sort {
                    sort.write(a, self);
                }
            });
        }
        body.field_opt("track_scores", search.track_scores);
        if self.features.supports_tracking_of_total_hits {
            body.field_opt(
                "track_total_hits",
                search.track_total_hits.map(|t| t.to_value()),
            );
        }
        body.field_opt("_source", search.source.as_ref().map(|s| s.to_value()));
        for (name, fields) in [
            ("fields", &search.fields),
            ("docvalue_fields", &search.docvalue_fields),
            ("stored_fields", &search.stored_fields),
        ] {
            if !fields.is_empty() {
                body.field(name, fields.clone());
            }
        }
        if !search.script_fields.is_empty() {
            body.obj("script_fields", |s| {
                for (name, script) in &search.script_fields {
                    s.obj(name.as_str(), |f| {
                        f.obj("script", |body| script.write(body));
                    });
                }
            });
        }
        body.field_opt("size", search.size)
            .field_opt("from", search.from)
            .field_opt("terminate_after", search.terminate_after);
        if !search.ext.is_empty() {
            body.field("ext", Value::Object(search.ext.clone()));
        }

        body.into_value()
    }

    /// `POST {indices}/_search`
    pub fn compile<S: 'static>(
        &self,
        indices: &[&str],
        search: &PreparedSearchQuery<S>,
    ) -> Request<SearchQueryResult<S>> {
        let prepared = search.clone();
        Request::new(Method::Post, index_path(indices, "_search"), move |response| {
            SearchQueryResult::decode(&ObjectReader::from_value(response)?, &prepared)
        })
        .params(search.params.to_pairs())
        .json(self.search_body(search))
    }

    /// Decodes a `_search` response against the query it answers
    pub fn decode<S>(
        &self,
        response: &Value,
        search: &PreparedSearchQuery<S>,
    ) -> Result<SearchQueryResult<S>> {
        SearchQueryResult::decode(&ObjectReader::from_value(response)?, search)
    }

    /// `POST {indices}/_count` with the filtered query of `search`
    pub fn compile_count<S>(&self, indices: &[&str], search: &SearchQuery<S>) -> Request<i64> {
        let mut body = ObjectBuilder::new();
        if let Some(query) = self.filtered_query(search) {
            body.obj("query", |q| query.serialize(q, self));
        }
        let params = SearchParams {
            routing: search.params.routing.clone(),
            preference: search.params.preference.clone(),
            ..SearchParams::default()
        };
        Request::new(Method::Post, index_path(indices, "_count"), |response| {
            ObjectReader::from_value(response)?.long("count")
        })
        .params(params.to_pairs())
        .json(body.into_value())
    }

    /// `POST _msearch`, one header line and one body line per search.
    /// Responses are matched to searches by position.
    pub fn compile_multi_search<S: 'static>(
        &self,
        searches: &[(String, PreparedSearchQuery<S>)],
    ) -> Request<Vec<MultiSearchItem<S>>> {
        let mut lines = Vec::with_capacity(searches.len() * 2);
        for (index, search) in searches {
            lines.push(multi_search_header(index, &search.params));
            lines.push(self.search_body(search));
        }
        let prepared: Vec<PreparedSearchQuery<S>> =
            searches.iter().map(|(_, search)| search.clone()).collect();
        Request::new(Method::Post, "_msearch", move |response| {
            decode_multi_search(response, &prepared)
        })
        .ndjson(lines)
    }
}

fn multi_search_header(index: &str, params: &SearchParams) -> Value {
    let mut header = ObjectBuilder::new();
    header
        .field("index", index)
        .field_opt("routing", params.routing.as_deref())
        .field_opt("preference", params.preference.as_deref())
        .field_opt("search_type", params.search_type.as_deref())
        .field_opt("request_cache", params.request_cache);
    header.into_value()
}

/// One entry of a multi-search response
#[derive(Debug, Clone)]
pub enum MultiSearchItem<S> {
    Ok(SearchQueryResult<S>),
    Failed { status: Option<i64>, error: ErrorCause },
}

impl<S> MultiSearchItem<S> {
    pub fn ok(&self) -> Option<&SearchQueryResult<S>> {
        match self {
            MultiSearchItem::Ok(result) => Some(result),
            MultiSearchItem::Failed { .. } => None,
        }
    }

    pub fn into_result(self) -> std::result::Result<SearchQueryResult<S>, ErrorCause> {
        match self {
            MultiSearchItem::Ok(result) => Ok(result),
            MultiSearchItem::Failed { error, .. } => Err(error),
        }
    }
}

fn decode_multi_search<S>(
    response: &Value,
    searches: &[PreparedSearchQuery<S>],
) -> Result<Vec<MultiSearchItem<S>>> {
    let reader = ObjectReader::from_value(response)?;
    let responses = reader.array("responses")?;
    if responses.len() != searches.len() {
        return Err(if responses.len() < searches.len() {
            Error::MissingField(responses.path_at(responses.len()))
        } else {
            Error::invalid_type(responses.path(), "one response per search")
        });
    }
    responses
        .objs()
        .zip(searches)
        .map(|(item, search)| {
            let item = item?;
            match item.obj_opt("error")? {
                Some(error) => Ok(MultiSearchItem::Failed {
                    status: item.long_opt("status")?,
                    error: ErrorCause::decode(&error)?,
                }),
                None => Ok(MultiSearchItem::Ok(SearchQueryResult::decode(&item, search)?)),
            }
        })
        .collect()
}
