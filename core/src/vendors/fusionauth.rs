//! FusionAuth. API overview: <https://fusionauth.io/docs/v1/tech/apis/>
//!
//! Paths include `api` (`/api/user/search`). Searches page with `startRow`
//! and `numberOfResults` and report the overall `total`.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{page_items, required_u64, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::ensure_get;

/// FusionAuth's own default page size; it is not sent explicitly.
pub const DEFAULT_NUMBER_OF_RESULTS: usize = 25;

#[derive(Debug, Clone)]
pub struct FusionAuthClient {
    rest: RestClient,
    number_of_results: usize,
}

impl FusionAuthClient {
    pub fn new(api_key: &str, base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url).with_header("Authorization", api_key),
            number_of_results: DEFAULT_NUMBER_OF_RESULTS,
        }
    }

    pub fn with_number_of_results(mut self, number_of_results: usize) -> Self {
        self.number_of_results = number_of_results.max(1);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(request)
    }

    /// Every item listed under `resource` (e.g. `"users"`).
    pub fn fetch_all(&self, request: &Request, resource: &str) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut start_row = 0;
        loop {
            let mut page = request.clone();
            if start_row != 0 {
                page.params.insert("startRow", start_row);
            }
            if self.number_of_results != DEFAULT_NUMBER_OF_RESULTS {
                page.params.insert("numberOfResults", self.number_of_results);
            }

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let total = required_u64(&response, "/total")?;
            if total == 0 {
                break;
            }
            let items = page_items(&response, resource)?;
            let exhausted = items.is_empty();
            resources.extend(items);
            if exhausted || resources.len() as u64 >= total {
                break;
            }
            start_row += self.number_of_results;
        }
        Ok(resources)
    }
}
