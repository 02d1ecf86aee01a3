//! Per-vendor clients.
//!
//! Each client binds the vendor's credentials and base URL to a
//! [`RestClient`](crate::common::RestClient) and owns that vendor's
//! pagination loop. The loops are deliberately not shared: every vendor
//! paginates differently (link headers, offsets, cursors, page numbers,
//! filter counts) and each contract belongs to the vendor.

pub mod canvas;
pub mod clickup;
pub mod directus;
pub mod eventbrite;
pub mod fusionauth;
pub mod livestorm;
pub mod mailchimp;
pub mod pipedrive;
pub mod prestashop;
pub mod wordpress;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::common::is_empty_value;
use crate::error::ApiError;
use crate::request::Request;

/// Paginated listings are only ever read with GET.
pub(crate) fn ensure_get(request: &Request) -> Result<(), ApiError> {
    if request.is_get() {
        Ok(())
    } else {
        Err(ApiError::InvalidMethod(format!(
            "{} (paginated listings are GET only)",
            request.method
        )))
    }
}

/// `Authorization` value for HTTP Basic auth.
pub(crate) fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

/// Unwrap `response[key]` unless the response is empty.
pub(crate) fn unwrap_envelope(response: Option<Value>, key: &str) -> Result<Option<Value>, ApiError> {
    match response {
        Some(value) if !is_empty_value(&value) => match value {
            Value::Object(mut map) => map
                .remove(key)
                .map(Some)
                .ok_or_else(|| ApiError::MissingField {
                    field: key.to_string(),
                }),
            _ => Err(ApiError::MissingField {
                field: key.to_string(),
            }),
        },
        other => Ok(other),
    }
}
