//! Pipedrive.
//!
//! Authenticates with the personal API token as an `api_token` query
//! parameter on every request. Listings page with `start` while
//! `additional_data.pagination.more_items_in_collection` holds, see
//! <https://pipedrive.readme.io/docs/core-api-concepts-pagination>.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{items_at, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::ensure_get;

#[derive(Debug, Clone)]
pub struct PipedriveClient {
    rest: RestClient,
    api_token: String,
}

impl PipedriveClient {
    /// `domain` is the company domain, as in `https://{domain}.pipedrive.com`.
    pub fn new(api_token: &str, domain: &str) -> Self {
        let rest = RestClient::new(format!("https://{domain}.pipedrive.com/api/v1"))
            .with_header("Content-Type", "application/json");
        Self {
            rest,
            api_token: api_token.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.rest = self.rest.with_base_url(base_url);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    fn authenticated(&self, request: &Request) -> Request {
        let mut request = request.clone();
        request.params.insert("api_token", self.api_token.as_str());
        request
    }

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(&self.authenticated(request))
    }

    /// Every item of a listing; Pipedrive sends `"data": null` for none.
    pub fn fetch_all(&self, request: &Request) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut start = 0;
        loop {
            let mut page = self.authenticated(request);
            if start != 0 {
                page.params.insert("start", start);
            }

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let more_items = response
                .pointer("/additional_data/pagination/more_items_in_collection")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let items = items_at(&response, "data");
            let exhausted = items.is_empty();
            start += items.len();
            resources.extend(items);
            if !more_items || exhausted {
                break;
            }
        }
        Ok(resources)
    }
}
