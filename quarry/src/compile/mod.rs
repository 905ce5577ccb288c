//! Compiler set
//!
//! Compilers turn expression trees into [`Request`]s: an HTTP method, a path,
//! URL parameters, an optional JSON or NDJSON body and the decode function
//! for the response. Every compiler is configured with the [`FeatureSet`] of
//! the engine it targets, which selects version-dependent wire shapes.

mod bulk;
mod mapping;
mod search;

pub use bulk::{ActionCompiler, BulkCompiler};
pub use mapping::{
    CreateIndexCompiler, CreateIndexResult, MappingCompiler, UpdateMappingCompiler, DEFAULT_TYPE_NAME,
};
pub use search::{MultiSearchItem, SearchQueryCompiler};

use crate::features::FeatureSet;
use crate::json::ObjectReader;
use crate::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// One document per line, each line newline-terminated
    NdJson(Vec<Value>),
}

impl RequestBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::NdJson(_) => "application/x-ndjson",
        }
    }

    pub fn encode(&self) -> Result<String> {
        match self {
            RequestBody::Json(value) => Ok(serde_json::to_string(value)?),
            RequestBody::NdJson(lines) => {
                let mut out = String::new();
                for line in lines {
                    out.push_str(&serde_json::to_string(line)?);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}

type Decoder<R> = Arc<dyn Fn(&Value) -> Result<R> + Send + Sync>;

/// A compiled call together with the routine decoding its response
pub struct Request<R> {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    decoder: Decoder<R>,
}

impl<R> Request<R> {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        decoder: impl Fn(&Value) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            decoder: Arc::new(decoder),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = Some(RequestBody::NdJson(lines));
        self
    }

    /// Body as a JSON document, `None` for NDJSON or empty requests
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn decode(&self, response: &Value) -> Result<R> {
        (self.decoder)(response)
    }
}

impl<R> Clone for Request<R> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            path: self.path.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            decoder: Arc::clone(&self.decoder),
        }
    }
}

impl<R> fmt::Debug for Request<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("body", &self.body)
            .finish()
    }
}

/// Engine-reported failure attached to one item of a batch response
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCause {
    pub error_type: String,
    pub reason: Option<String>,
}

impl ErrorCause {
    pub(crate) fn decode(error: &ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            error_type: error.string("type")?.to_string(),
            reason: error.string_opt("reason")?.map(str::to_string),
        })
    }
}

/// `{"acknowledged": true}` style responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub acknowledged: bool,
}

impl Acknowledged {
    pub fn decode(response: &Value) -> Result<Self> {
        let reader = ObjectReader::from_value(response)?;
        Ok(Self {
            acknowledged: reader.boolean("acknowledged")?,
        })
    }
}

/// Every compiler configured for one engine
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerSet {
    pub search: SearchQueryCompiler,
    pub mapping: MappingCompiler,
    pub create_index: CreateIndexCompiler,
    pub update_mapping: UpdateMappingCompiler,
    pub bulk: BulkCompiler,
}

impl CompilerSet {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            search: SearchQueryCompiler::new(features),
            mapping: MappingCompiler::new(features),
            create_index: CreateIndexCompiler::new(features),
            update_mapping: UpdateMappingCompiler::new(features),
            bulk: BulkCompiler::new(features),
        }
    }
}

/// `{indices}/{endpoint}`, or the bare endpoint when no index is given
pub(crate) fn index_path(indices: &[&str], endpoint: &str) -> String {
    if indices.is_empty() {
        endpoint.to_string()
    } else {
        format!("{}/{}", indices.join(","), endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ndjson_lines_are_newline_terminated() {
        let body = RequestBody::NdJson(vec![json!({"index": {}}), json!({"a": 1})]);
        assert_eq!(body.encode().unwrap(), "{\"index\":{}}\n{\"a\":1}\n");
        assert_eq!(body.content_type(), "application/x-ndjson");
    }

    #[test]
    fn test_request_decode_and_params() {
        let request = Request::new(Method::Get, "posts/_count", |body: &Value| {
            ObjectReader::from_value(body)?.long("count")
        })
        .param("routing", "u1");

        assert_eq!(request.params, vec![("routing".to_string(), "u1".to_string())]);
        assert_eq!(request.decode(&json!({"count": 7})).unwrap(), 7);
        assert!(request.decode(&json!({})).unwrap_err().is_decode_error());
    }

    #[test]
    fn test_index_path() {
        assert_eq!(index_path(&[], "_search"), "_search");
        assert_eq!(index_path(&["a", "b"], "_search"), "a,b/_search");
    }
}
