//! WordPress REST API behind the JWT Auth plugin
//! (<https://github.com/WP-API/jwt-auth>).
//!
//! # Design
//! Requests carry a bearer token obtained from `POST {base}/wp/v2/token`
//! with the application's key and secret. The token is kept in an
//! `Expiring` slot for the `exp` seconds the endpoint reports, so a client
//! asks for a new token only once the previous one has lapsed.
//!
//! Listings page with `page` (from 1) and stop after `total_pages`, read
//! from the response body.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Expiring;
use crate::common::{page_items, RestClient};
use crate::error::ApiError;
use crate::request::{Body, FilePart, Params, Request};
use crate::transport::Transport;
use crate::vendors::ensure_get;

/// Token issued by the JWT Auth token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub exp: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("exp", &self.exp)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct WordPressClient {
    rest: RestClient,
    api_key: String,
    api_secret: String,
    token: Expiring<AccessToken>,
}

impl WordPressClient {
    /// `base_url` is the REST root, e.g. `https://example.com/wp-json`.
    pub fn new(base_url: impl Into<String>, api_key: &str, api_secret: &str) -> Self {
        Self {
            rest: RestClient::new(base_url),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            token: Expiring::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.rest = self.rest.with_transport(transport);
        self
    }

    /// The current token, fetching a new one when none is fresh.
    pub fn access_token(&self) -> Result<AccessToken, ApiError> {
        self.token.get_or_refresh(
            || self.request_token(),
            |token| Duration::from_secs(token.exp),
        )
    }

    fn request_token(&self) -> Result<AccessToken, ApiError> {
        let form = Params::new()
            .with("api_key", self.api_key.as_str())
            .with("api_secret", self.api_secret.as_str());
        let response = self
            .rest
            .call(&Request::post("/wp/v2/token").form(form))?
            .unwrap_or(Value::Null);
        serde_json::from_value(response).map_err(ApiError::Decode)
    }

    fn authorized(&self, request: &Request) -> Result<Request, ApiError> {
        let token = self.access_token()?;
        Ok(request
            .clone()
            .header("Authorization", format!("Bearer {}", token.access_token)))
    }

    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        self.rest.call(&self.authorized(request)?)
    }

    /// Upload `file` as the multipart `file` part, with `fields` alongside.
    pub fn upload(&self, path: &str, fields: Params, file: FilePart) -> Result<Option<Value>, ApiError> {
        let file = FilePart {
            name: "file".to_string(),
            ..file
        };
        let request = Request {
            body: Body::Multipart {
                fields,
                files: vec![file],
            },
            ..Request::post(path)
        };
        self.call(&request)
    }

    /// Every item listed under `resource`.
    pub fn fetch_all(&self, request: &Request, resource: &str) -> Result<Vec<Value>, ApiError> {
        ensure_get(request)?;
        let mut resources = Vec::new();
        let mut current_page: u64 = 1;
        loop {
            let mut page = self.authorized(request)?;
            if current_page != 1 {
                page.params.insert("page", current_page);
            }

            let response = self.rest.call(&page)?.unwrap_or(Value::Null);
            let total_pages = response
                .get("total_pages")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            resources.extend(page_items(&response, resource)?);

            if current_page >= total_pages {
                break;
            }
            current_page += 1;
        }
        Ok(resources)
    }
}
