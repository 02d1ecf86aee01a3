//! Directus. Reference: <https://docs.directus.io/reference/introduction/>
//!
//! Responses wrap their payload in `data`; `call` unwraps it. A `filter`
//! query parameter given as a JSON object is sent as JSON text, which is
//! what Directus expects. Listings page by `offset` and stop once the
//! number of items collected reaches `meta.filter_count`, the item count of
//! the collection under the current filter/search parameters.

use std::sync::Arc;

use serde_json::Value;

use crate::common::{page_items, required_u64, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::{ensure_get, unwrap_envelope};

#[derive(Debug, Clone)]
pub struct DirectusClient {
    rest: RestClient,
}

impl DirectusClient {
    /// `token` is a static user token; `base_url` is the instance URL
    /// without trailing slash.
    pub fn new(token: &str, base_url: impl Into<String>) -> Self {
        let rest = RestClient::new(base_url).with_header("Authorization", format!("Bearer {token}"));
        Self { rest }
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
        let mut results: Vec<Value> = Vec::new();
        loop {
            let mut page = request.clone();
            if !results.is_empty() {
                page.params.insert("offset", results.len());
            }
            page.params.insert("meta", "filter_count");

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let filter_count = required_u64(&response, "/meta/filter_count")?;
            let items = page_items(&response, "data")?;
            if items.is_empty() {
                break;
            }
            results.extend(items);
            if results.len() as u64 >= filter_count {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::vendors::testing::pages;

    const BASE: &str = "https://cms.example.com";

    #[test]
    fn pages_by_offset_until_filter_count() {
        let transport = pages([
            json!({"data": [{"id": 1}, {"id": 2}], "meta": {"filter_count": 5}}),
            json!({"data": [{"id": 3}, {"id": 4}], "meta": {"filter_count": 5}}),
            json!({"data": [{"id": 5}], "meta": {"filter_count": 5}}),
        ]);
        let client = DirectusClient::new("static", BASE).with_transport(transport.clone());

        let items = client
            .fetch_all(
                &Request::get("/items/articles")
                    .param("limit", 2)
                    .param("filter", json!({"status": {"_eq": "published"}})),
            )
            .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(items[4]["id"], 5);
        let filter = "filter=%7B%22status%22%3A%7B%22_eq%22%3A%22published%22%7D%7D";
        assert_eq!(
            transport.urls(),
            vec![
                format!("{BASE}/items/articles?limit=2&{filter}&meta=filter_count"),
                format!("{BASE}/items/articles?limit=2&{filter}&offset=2&meta=filter_count"),
                format!("{BASE}/items/articles?limit=2&{filter}&offset=4&meta=filter_count"),
            ]
        );
    }

    #[test]
    fn empty_collection_is_one_request() {
        let transport = pages([json!({"data": [], "meta": {"filter_count": 0}})]);
        let client = DirectusClient::new("static", BASE).with_transport(transport.clone());
        assert!(client.fetch_all(&Request::get("/items/empty")).unwrap().is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn missing_filter_count_is_an_error() {
        let transport = pages([json!({"data": [{"id": 1}]})]);
        let client = DirectusClient::new("static", BASE).with_transport(transport);
        let err = client.fetch_all(&Request::get("/items/x")).unwrap_err();
        assert!(matches!(err, ApiError::MissingField { field } if field == "/meta/filter_count"));
    }

    #[test]
    fn call_unwraps_data() {
        let transport = pages([json!({"data": {"id": 1, "title": "Hello"}})]);
        let client = DirectusClient::new("static", BASE).with_transport(transport.clone());

        let item = client.call(&Request::get("/items/articles/1")).unwrap();

        assert_eq!(item, Some(json!({"id": 1, "title": "Hello"})));
        assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer static"));
    }

    #[test]
    fn call_passes_empty_response_through() {
        let transport = std::sync::Arc::new(crate::transport::ReplayTransport::new([
            crate::http::HttpResponse::text_body(204, ""),
        ]));
        let client = DirectusClient::new("static", BASE).with_transport(transport);
        assert_eq!(client.call(&Request::delete("/items/articles/1")).unwrap(), None);
    }
}
