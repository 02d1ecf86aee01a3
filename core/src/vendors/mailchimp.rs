//! Mailchimp Marketing API.
//!
//! API reference: <https://mailchimp.com/developer/marketing/api/>
//!
//! # Design
//! The datacenter is the suffix of the API key (`...-us6`), which also
//! selects the base URL. Listings page with `count`/`offset` against
//! `total_items`.
//!
//! `MailchimpBatch` submits many operations at once through `/batches`,
//! polls until the batch is finished, then downloads the result archive
//! (a gzip-compressed tar of JSON files) and pairs each operation with its
//! result by position.

use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flate2::read::GzDecoder;
use serde_json::{json, Value};
use tar::Archive;
use tracing::{debug, error, warn};

use crate::common::{execute, page_items, required_u64, RestClient};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::{basic_auth, ensure_get};

pub const DEFAULT_COUNT: usize = 10;
/// Polling attempts before a batch is given up on.
pub const DEFAULT_PATIENCE: u32 = 120;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MailchimpClient {
    rest: RestClient,
    count: usize,
}

impl MailchimpClient {
    /// Fails when the key has no `-<datacenter>` suffix.
    pub fn new(api_key: &str) -> Result<Self, ApiError> {
        let datacenter = api_key
            .split('-')
            .nth(1)
            .filter(|dc| !dc.is_empty())
            .ok_or_else(|| ApiError::InvalidApiKey("missing datacenter suffix".to_string()))?;
        let rest = RestClient::new(format!("https://{datacenter}.api.mailchimp.com/3.0"))
            .with_header("Authorization", basic_auth("username", api_key));
        Ok(Self {
            rest,
            count: DEFAULT_COUNT,
        })
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.rest = self.rest.with_base_url(base_url);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(request)
    }

    /// Every item listed under `resource` (e.g. `"lists"`, `"members"`).
    pub fn fetch_all(&self, request: &Request, resource: &str) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut results = Vec::new();
        let mut offset = 0;
        loop {
            let mut page = request.clone();
            page.params.insert("count", self.count);
            page.params.insert("offset", offset);

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let total_items = required_u64(&response, "/total_items")? as i64;
            let items = if total_items > 0 {
                page_items(&response, resource)?
            } else {
                Vec::new()
            };
            let remainder = total_items - items.len() as i64 - offset as i64;
            let exhausted = items.is_empty();
            results.extend(items);
            if remainder <= 0 || exhausted {
                break;
            }
            offset += self.count;
        }
        Ok(results)
    }

    /// Wrap this client for batch operations.
    pub fn batch(self) -> MailchimpBatch {
        MailchimpBatch::new(self)
    }
}

/// One operation of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    pub method: HttpMethod,
    pub path: String,
    /// Sent as JSON text in the batch's `body` field.
    pub body: Value,
}

impl BatchOperation {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// An operation paired with its result. Either side may be missing when
/// the batch reports a different number of results than was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub operation: Option<BatchOperation>,
    pub result: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct MailchimpBatch {
    client: MailchimpClient,
    patience: u32,
    poll_interval: Duration,
}

impl MailchimpBatch {
    pub fn new(client: MailchimpClient) -> Self {
        Self {
            client,
            patience: DEFAULT_PATIENCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_patience(mut self, patience: u32) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Submit `operations`, wait for the batch to finish and collect results.
    pub fn run(&self, operations: &[BatchOperation]) -> Result<Vec<BatchOutcome>, ApiError> {
        let ops: Vec<Value> = operations
            .iter()
            .map(|op| {
                json!({
                    "method": op.method.as_str(),
                    "path": op.path,
                    "body": op.body.to_string(),
                })
            })
            .collect();

        let batch = self
            .client
            .call(&Request::post("/batches").json(json!({ "operations": ops })))?
            .unwrap_or(Value::Null);
        let batch_id = batch
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::MissingField {
                field: "id".to_string(),
            })?
            .to_string();

        let response_body_url = self.wait_for(&batch_id)?;
        let results = match response_body_url {
            Some(url) => self.download_results(&url)?,
            None => Vec::new(),
        };

        for (op, result) in operations.iter().zip(&results) {
            let status_code = result.get("status_code").and_then(Value::as_u64);
            if status_code != Some(200) {
                let response = result.get("response").unwrap_or(&Value::Null);
                error!(
                    method = %op.method,
                    path = %op.path,
                    status_code = ?status_code,
                    response = %response,
                    "batch operation failed"
                );
            }
        }

        let len = operations.len().max(results.len());
        let mut results = results.into_iter();
        Ok((0..len)
            .map(|i| BatchOutcome {
                operation: operations.get(i).cloned(),
                result: results.next(),
            })
            .collect())
    }

    /// Poll until the batch is finished; its `response_body_url`, if any.
    fn wait_for(&self, batch_id: &str) -> Result<Option<String>, ApiError> {
        let mut last_status = None;
        for attempt in 1..=self.patience {
            let update = self
                .client
                .call(&Request::get(format!("/batches/{batch_id}")))?
                .unwrap_or(Value::Null);
            let status = update.get("status").and_then(Value::as_str).map(str::to_string);
            if status.as_deref() == Some("finished") {
                return Ok(update
                    .get("response_body_url")
                    .and_then(Value::as_str)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string));
            }
            debug!(batch_id, status = ?status, attempt, "batch not finished yet");
            last_status = status;
            if attempt < self.patience {
                thread::sleep(self.poll_interval);
            }
        }
        Err(ApiError::Timeout {
            batch_id: batch_id.to_string(),
            last_status,
        })
    }

    /// The archive lives on a pre-signed URL, fetched without credentials.
    fn download_results(&self, url: &str) -> Result<Vec<Value>, ApiError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        };
        let response = execute(self.client.rest.transport().as_ref(), &request)?;
        read_results(&response.body, url)
    }
}

/// Concatenate the JSON arrays found in every non-empty file of a tar
/// archive, gzip-compressed or not. Unreadable files are skipped.
fn read_results(bytes: &[u8], source: &str) -> Result<Vec<Value>, ApiError> {
    let reader: Box<dyn Read + '_> = if bytes.starts_with(&[0x1f, 0x8b]) {
        Box::new(GzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };
    let mut archive = Archive::new(reader);

    let mut results = Vec::new();
    for entry in archive.entries().map_err(ApiError::Archive)? {
        let mut entry = entry.map_err(ApiError::Archive)?;
        if !entry.header().entry_type().is_file() || entry.size() == 0 {
            continue;
        }
        let name = entry
            .path()
            .map(|path| path.display().to_string())
            .unwrap_or_default();

        let mut content = Vec::new();
        if let Err(err) = entry.read_to_end(&mut content) {
            warn!(file = %name, source, error = %err, "unable to read response content");
            continue;
        }
        match serde_json::from_slice::<Vec<Value>>(&content) {
            Ok(items) => results.extend(items),
            Err(err) => warn!(file = %name, source, error = %err, "unable to read response content"),
        }
    }
    Ok(results)
}
