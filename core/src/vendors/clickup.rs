//! ClickUp. Guide: <https://clickup.com/api>
//!
//! Paths do not include the version (`/team`). Bodies are JSON. ClickUp
//! listings are not exhausted here, so there is no `fetch_all`.

use std::sync::Arc;

use serde_json::Value;

use crate::common::RestClient;
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;

pub const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

#[derive(Debug, Clone)]
pub struct ClickUpClient {
    rest: RestClient,
}

impl ClickUpClient {
    /// `api_token` is a personal token from the Apps section of the user
    /// settings.
    pub fn new(api_token: &str) -> Self {
        let rest = RestClient::new(DEFAULT_BASE_URL)
            .with_header("Authorization", api_token)
            .with_header("Content-Type", "application/json");
        Self { rest }
    }

    /// Only change this if ClickUp asks you to.
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
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::vendors::testing::pages;

    #[test]
    fn call_uses_raw_token_and_default_base() {
        let transport = pages([json!({"teams": [{"id": "1"}]})]);
        let client = ClickUpClient::new("pk_123").with_transport(transport.clone());

        let teams = client.call(&Request::get("/team")).unwrap().unwrap();

        assert_eq!(teams["teams"][0]["id"], "1");
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://api.clickup.com/api/v2/team");
        assert_eq!(sent.header("Authorization"), Some("pk_123"));
        assert_eq!(sent.header("content-type"), Some("application/json"));
    }

    #[test]
    fn json_body_is_sent() {
        let transport = pages([json!({"id": "task"})]);
        let client = ClickUpClient::new("pk_123")
            .with_base_url("http://localhost:9000")
            .with_transport(transport.clone());

        client
            .call(&Request::post("/list/9/task").json(json!({"name": "Write docs"})))
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://localhost:9000/list/9/task");
        assert_eq!(sent.body.as_deref(), Some(&br#"{"name":"Write docs"}"#[..]));
    }
}
