//! Cluster session: version resolution and typed calls
//!
//! A [`Cluster`] owns a [`Transport`] and the compiler set matching the
//! engine behind it. The engine version is resolved at most once per
//! session, on first use, by reading the root endpoint. Concurrent callers
//! wait on the same resolution and observe the same value; a failed
//! resolution leaves the cell empty so the next call tries again.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::{HttpTransport, Transport, TransportResponse};
use quarry::bulk::{BulkAction, BulkResult, Refresh};
use quarry::compile::{
    Acknowledged, CompilerSet, CreateIndexResult, Method, MultiSearchItem, Request,
};
use quarry::mapping::DocumentMapping;
use quarry::{FeatureSet, PreparedSearchQuery, SearchQuery, SearchQueryResult, Version};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Engine version together with the compilers configured for it
#[derive(Debug, Clone, Copy)]
pub struct EngineInfo {
    pub version: Version,
    pub features: FeatureSet,
    pub compilers: CompilerSet,
}

impl EngineInfo {
    pub fn for_version(version: Version) -> Result<Self> {
        let features = FeatureSet::for_version(&version)?;
        Ok(Self {
            version,
            features,
            compilers: CompilerSet::new(features),
        })
    }
}

pub struct Cluster<T: Transport = HttpTransport> {
    transport: T,
    engine: OnceCell<EngineInfo>,
}

impl Cluster<HttpTransport> {
    /// HTTP session from configuration. A pinned version skips detection.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        match config.pinned_version()? {
            Some(version) => Self::with_version(transport, version),
            None => Ok(Self::new(transport)),
        }
    }
}

impl<T: Transport> Cluster<T> {
    /// Session that detects the engine version on first use
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            engine: OnceCell::new(),
        }
    }

    /// Session pinned to `version`; the root endpoint is never read
    pub fn with_version(transport: T, version: Version) -> Result<Self> {
        let engine = EngineInfo::for_version(version)?;
        Ok(Self {
            transport,
            engine: OnceCell::new_with(Some(engine)),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolves the engine version once and returns the memoized value
    pub async fn engine(&self) -> Result<&EngineInfo> {
        self.engine
            .get_or_try_init(|| async {
                let response = self.send(Method::Get, "", &[], None).await?;
                let version = Version::from_info_response(&response)?;
                let engine = EngineInfo::for_version(version)?;
                info!(version = %engine.version, "Resolved engine version");
                Ok::<_, ClientError>(engine)
            })
            .await
    }

    pub async fn version(&self) -> Result<Version> {
        Ok(self.engine().await?.version)
    }

    pub async fn compilers(&self) -> Result<&CompilerSet> {
        Ok(&self.engine().await?.compilers)
    }

    /// Sends a compiled request and decodes its response
    pub async fn execute<R>(&self, request: &Request<R>) -> Result<R> {
        let body = self
            .send(
                request.method,
                &request.path,
                &request.params,
                request.body.as_ref(),
            )
            .await?;
        Ok(request.decode(&body)?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&quarry::compile::RequestBody>,
    ) -> Result<Value> {
        debug!(%method, path, "Executing request");
        let response = self.transport.execute(method, path, params, body).await?;
        check_status(path, response)
    }

    // ------------------------------------------------------------------------
    // Typed calls
    // ------------------------------------------------------------------------

    pub async fn search<S: 'static>(
        &self,
        indices: &[&str],
        search: &PreparedSearchQuery<S>,
    ) -> Result<SearchQueryResult<S>> {
        let request = self.compilers().await?.search.compile(indices, search);
        self.execute(&request).await
    }

    pub async fn count<S>(&self, indices: &[&str], search: &SearchQuery<S>) -> Result<i64> {
        let request = self.compilers().await?.search.compile_count(indices, search);
        self.execute(&request).await
    }

    /// One `_msearch` round trip; items come back in request order
    pub async fn multi_search<S: 'static>(
        &self,
        searches: &[(String, PreparedSearchQuery<S>)],
    ) -> Result<Vec<MultiSearchItem<S>>> {
        if searches.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .compilers()
            .await?
            .search
            .compile_multi_search(searches);
        self.execute(&request).await
    }

    pub async fn bulk(
        &self,
        index: Option<&str>,
        actions: &[BulkAction],
        refresh: Option<Refresh>,
    ) -> Result<BulkResult> {
        let request = self.compilers().await?.bulk.compile(index, actions, refresh);
        let result = self.execute(&request).await?;
        if result.errors {
            warn!(
                failed = result.failures().count(),
                total = result.items.len(),
                "Bulk request had failed items"
            );
        }
        Ok(result)
    }

    pub async fn create_index(
        &self,
        index: &str,
        settings: Option<&Map<String, Value>>,
        mapping: &DocumentMapping,
    ) -> Result<CreateIndexResult> {
        let request = self
            .compilers()
            .await?
            .create_index
            .compile(index, settings, mapping);
        self.execute(&request).await
    }

    pub async fn update_mapping(
        &self,
        index: &str,
        mapping: &DocumentMapping,
    ) -> Result<Acknowledged> {
        let request = self
            .compilers()
            .await?
            .update_mapping
            .compile(index, mapping);
        self.execute(&request).await
    }

    /// `HEAD {index}`; a not-found answer is `false`, other failures propagate
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let request = Request::new(Method::Head, index, |_| Ok(()));
        match self.execute(&request).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_index(&self, index: &str) -> Result<Acknowledged> {
        let request = Request::new(Method::Delete, index, Acknowledged::decode);
        self.execute(&request).await
    }

    /// Status code of the root endpoint. Only an unreachable engine is an error.
    pub async fn ping(&self) -> Result<u16> {
        debug!("Pinging engine");
        let response = self.transport.execute(Method::Head, "", &[], None).await?;
        Ok(response.status)
    }
}

/// Turns non-2xx responses into errors, reading the engine's error body
fn check_status(path: &str, response: TransportResponse) -> Result<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let cause = response.body.get("error");
    let (error_type, reason) = match cause {
        Some(Value::Object(error)) => (
            error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        Some(Value::String(message)) => (message.clone(), None),
        _ if response.status == 404 => return Err(ClientError::NotFound(path.to_string())),
        _ => (
            "unknown".to_string(),
            response.body.as_str().map(str::to_string),
        ),
    };

    warn!(
        status = response.status,
        error_type = %error_type,
        path,
        "Engine returned an error"
    );
    Err(ClientError::Status {
        status: response.status,
        error_type,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_status_reads_error_bodies() {
        let ok = check_status("posts", TransportResponse::new(200, json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"a": 1}));

        let err = check_status(
            "posts/_search",
            TransportResponse::new(
                400,
                json!({"error": {"type": "parsing_exception", "reason": "bad"}, "status": 400}),
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: 400, ref error_type, reason: Some(ref r) }
                if error_type == "parsing_exception" && r == "bad"
        ));

        let err = check_status("posts", TransportResponse::new(404, Value::Null)).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(ref p) if p == "posts"));

        let err = check_status(
            "posts",
            TransportResponse::new(
                404,
                json!({"error": {"type": "index_not_found_exception"}, "status": 404}),
            ),
        )
        .unwrap_err();
        assert!(err.is_not_found());

        let err = check_status("x", TransportResponse::new(500, json!("IndexMissingException[x]")))
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: 500, ref error_type, reason: Some(_) } if error_type == "unknown"
        ));
    }

    #[test]
    fn test_legacy_string_error() {
        let err = check_status(
            "posts",
            TransportResponse::new(400, json!({"error": "SearchPhaseExecutionException[...]", "status": 400})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { ref error_type, reason: None, .. }
                if error_type == "SearchPhaseExecutionException[...]"
        ));
    }
}
