//! The shared low-level helper every vendor client delegates to.
//!
//! # Design
//! `RestClient` binds a base URL, the vendor's default headers and a
//! transport. One `send` is one HTTP call: it assembles the complete URL,
//! encodes the body, logs the status and turns any non-2xx response into
//! `ApiError::Status` after logging the body. There are no retries.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::cache::CachedClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::request::Request;
use crate::transport::{Transport, UreqTransport};

/// Base URL + default headers + transport.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Headers carry credentials.
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// A client over a fresh `UreqTransport`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            transport: Arc::new(UreqTransport::new()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Memoize GET calls made through this client.
    pub fn cached(self) -> CachedClient {
        CachedClient::new(self)
    }

    /// Resolve a `Request` into the `HttpRequest` that will go on the wire.
    pub fn build(&self, request: &Request) -> Result<HttpRequest, ApiError> {
        let mut headers = self.headers.clone();
        let body = match request.body.encode()? {
            Some(encoded) => {
                // Multipart carries its boundary in the content type.
                headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
                headers.push(("content-type".to_string(), encoded.content_type));
                Some(encoded.bytes)
            }
            None => None,
        };
        headers.extend(request.headers.iter().cloned());

        Ok(HttpRequest {
            method: request.method,
            url: request.complete_url(&self.base_url),
            headers,
            body,
        })
    }

    /// Issue exactly one HTTP call; any non-2xx status is an error.
    pub fn send(&self, request: &Request) -> Result<HttpResponse, ApiError> {
        let http_request = self.build(request)?;
        execute(self.transport.as_ref(), &http_request)
    }

    /// `send`, then decode the body: empty → `None`, otherwise JSON.
    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        let response = self.send(request)?;
        decode(&response)
    }
}

/// Run one request through `transport`, logging the outcome.
pub fn execute(transport: &dyn Transport, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let response = transport.execute(request)?;
    debug!("request {} on {} got {}", request.method, request.url, response.status);
    if response.is_success() {
        return Ok(response);
    }

    let body = response.text().into_owned();
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => error!(status = response.status, body = %json, "request failed"),
        Err(_) => error!(status = response.status, body = %body, "request failed"),
    }
    Err(ApiError::Status {
        status: response.status,
        url: request.url.clone(),
        body,
    })
}

/// Empty body → `None`, otherwise the parsed JSON.
pub fn decode(response: &HttpResponse) -> Result<Option<Value>, ApiError> {
    if response.body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(ApiError::Decode)
}

/// Whether a decoded value counts as "nothing": `null`, `false`, `0`, `""`,
/// `[]` or `{}`. Clients that unwrap an envelope hand such values back as-is.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Items of a page: the array at `value[key]`, or nothing when absent.
pub(crate) fn items_at(value: &Value, key: &str) -> Vec<Value> {
    match value.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Items of a page: the array at `value[key]`, which must be there.
pub(crate) fn page_items(value: &Value, key: &str) -> Result<Vec<Value>, ApiError> {
    match value.get(key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(ApiError::MissingField {
            field: key.to_string(),
        }),
    }
}

/// Unsigned integer at a JSON pointer such as `/meta/filter_count`.
pub(crate) fn required_u64(value: &Value, pointer: &str) -> Result<u64, ApiError> {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::MissingField {
            field: pointer.to_string(),
        })
}
