//! Eventbrite. API reference: <https://www.eventbrite.com/platform/api>
//!
//! Listings paginate with continuation tokens: while
//! `pagination.has_more_items` is true, the next request carries
//! `continuation` from the previous page.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{page_items, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::ensure_get;

pub const DEFAULT_BASE_URL: &str = "https://www.eventbriteapi.com/v3";

#[derive(Debug, Clone)]
pub struct EventbriteClient {
    rest: RestClient,
}

impl EventbriteClient {
    pub fn new(token: &str) -> Self {
        let rest = RestClient::new(DEFAULT_BASE_URL)
            .with_header("Authorization", format!("Bearer {token}"))
            .with_header("Content-Type", "application/json");
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

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(request)
    }

    /// Every item listed under `resource` (e.g. `"events"`), page after page.
    pub fn fetch_all(&self, request: &Request, resource: &str) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut page = request.clone();
            if let Some(token) = &continuation {
                page.params.insert("continuation", token.as_str());
            }

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            resources.extend(page_items(&response, resource)?);

            let has_more_items = response
                .pointer("/pagination/has_more_items")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_more_items {
                break;
            }
            continuation = Some(
                response
                    .pointer("/pagination/continuation")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::MissingField {
                        field: "/pagination/continuation".to_string(),
                    })?
                    .to_string(),
            );
        }
        Ok(resources)
    }
}
