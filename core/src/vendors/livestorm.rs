//! Livestorm. API reference: <https://developers.livestorm.co/reference>
//!
//! JSON:API style: payloads sit under `data`, paging under `meta`. Pages are
//! numbered from 0 through `page[number]`; `meta.page_count` tells how many
//! there are.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{page_items, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::{ensure_get, unwrap_envelope};

pub const DEFAULT_BASE_URL: &str = "https://api.livestorm.co/v1";

#[derive(Debug, Clone)]
pub struct LivestormClient {
    rest: RestClient,
}

impl LivestormClient {
    /// `api_key` comes from Account Settings > Integrations.
    pub fn new(api_key: &str) -> Self {
        let rest = RestClient::new(DEFAULT_BASE_URL)
            .with_header("accept", "application/vnd.api+json")
            .with_header("Authorization", api_key);
        Self { rest }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.rest = self.rest.with_base_url(base_url);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    /// The response's `data`, or the raw response when it is empty.
    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        unwrap_envelope(self.rest.call(request)?, "data")
    }

    pub fn fetch_all(&self, request: &Request) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut results = Vec::new();
        let mut current_page: u64 = 0;
        loop {
            let mut page = request.clone();
            if current_page != 0 {
                page.params.insert("page[number]", current_page);
            }

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            // Unpaginated endpoints carry no meta: a single page.
            let page_count = response
                .pointer("/meta/page_count")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            results.extend(page_items(&response, "data")?);

            current_page += 1;
            if current_page >= page_count {
                break;
            }
        }
        Ok(results)
    }
}
