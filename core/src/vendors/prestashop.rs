//! PrestaShop webservice, JSON flavour.
//!
//! The webservice key is sent as the Basic-auth user with an empty password
//! and `Io-Format: JSON` asks for JSON instead of XML. Responses are a
//! single-key object such as `{"products": [...]}`; `call` returns what is
//! under that key. Listings page with `limit={index},{count}` and end at the
//! first short page.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{items_at, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::{basic_auth, ensure_get};

pub const PAGE_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct PrestaShopClient {
    rest: RestClient,
    page_size: usize,
}

impl PrestaShopClient {
    pub fn new(access_key: &str, base_url: impl Into<String>) -> Self {
        let rest = RestClient::new(base_url)
            .with_header("Authorization", basic_auth(access_key, ""))
            .with_header("Io-Format", "JSON");
        Self {
            rest,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    /// The value under the response's first key. Empty responses (PrestaShop
    /// answers `[]` when nothing matches) are returned unchanged.
    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        match self.rest.call(request)? {
            Some(Value::Object(map)) if !map.is_empty() => Ok(map.into_iter().next().map(|(_, v)| v)),
            other => Ok(other),
        }
    }

    /// Every item listed under `resource` (e.g. `"products"`).
    pub fn fetch_all(&self, request: &Request, resource: &str) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut index = 0;
        loop {
            let mut page = request.clone();
            page.params.insert("limit", format!("{index},{}", self.page_size));

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let items = items_at(&response, resource);
            let full_page = items.len() == self.page_size;
            resources.extend(items);
            if !full_page {
                break;
            }
            index += self.page_size;
        }
        Ok(resources)
    }
}
