//! Canvas LMS.
//!
//! API reference: <https://canvas.instructure.com/doc/api/index.html>
//!
//! Paths include the version (`/api/v1/accounts`). Request bodies are
//! form-encoded. Listings paginate through the `Link` response header: each
//! page is a JSON array and the next page is the absolute URL tagged
//! `rel="next"`.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::common::{decode, RestClient};
use crate::error::ApiError;
use crate::request::Request;
use crate::transport::Transport;
use crate::vendors::ensure_get;

#[derive(Debug, Clone)]
pub struct CanvasClient {
    rest: RestClient,
}

impl CanvasClient {
    /// `base_url` is the institution's canonical URL, e.g.
    /// `https://example.instructure.com`. `access_token` is a personal
    /// access token.
    pub fn new(access_token: &str, base_url: impl Into<String>) -> Self {
        let rest =
            RestClient::new(base_url).with_header("Authorization", format!("Bearer {access_token}"));
        Self { rest }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(request)
    }

    /// Every item of a paginated listing, following `rel="next"` links.
    pub fn fetch_all(&self, request: &Request) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut next_url = Some(request.complete_url(self.rest.base_url()));

        while let Some(url) = next_url.take() {
            let page_request = Request {
                url: Some(url),
                params: Default::default(),
                ..request.clone()
            };
            let response = self.rest.send(&page_request)?;
            next_url = response.header("link").and_then(next_link);
            match decode(&response)? {
                Some(Value::Array(items)) => resources.extend(items),
                Some(other) => resources.push(other),
                None => {}
            }
        }
        Ok(resources)
    }
}

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]*)>[^<]*?\brel\s*=\s*"?([^";,]+)"?"#).expect("LINK_RE is a valid regex pattern")
});

/// `rel -> url` for every link of an RFC 8288 `Link` header. A link with
/// several space-separated relations is listed under each of them.
fn links(header: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();
    for captures in LINK_RE.captures_iter(header) {
        for rel in captures[2].split_whitespace() {
            links.insert(rel.to_string(), captures[1].to_string());
        }
    }
    links
}

fn next_link(header: &str) -> Option<String> {
    links(header).remove("next")
}
