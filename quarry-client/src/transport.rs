//! Transport abstraction and the reqwest-backed HTTP transport

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use quarry::compile::{Method, RequestBody};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Raw engine response: HTTP status and the parsed body
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// `Value::Null` for empty bodies (HEAD requests)
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one compiled call against the engine.
///
/// Implementations only move bytes: they return every HTTP status as a
/// response and fail only when the engine could not be reached or the body
/// could not be read.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&RequestBody>,
    ) -> Result<TransportResponse>;
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let credentials = config
            .username
            .clone()
            .map(|username| (username, config.password.clone()));

        Ok(Self {
            client,
            base_url: config.base_url()?,
            credentials,
        })
    }

    /// Joins `path` below the base URL, keeping any base path prefix
    pub fn url_for(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Parses a response body. Non-JSON error pages are kept as a string.
fn parse_body(status: u16, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) if !(200..300).contains(&status) => Ok(Value::String(text.to_string())),
        Err(e) => Err(ClientError::Json(e)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&RequestBody>,
    ) -> Result<TransportResponse> {
        let url = self.url_for(path, params)?;
        let mut request = self.client.request(to_reqwest(method), url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref());
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, body.content_type())
                .body(body.encode()?);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(TransportResponse::new(status, parse_body(status, &text)?))
    }
}
