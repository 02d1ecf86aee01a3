//! Error type shared by every vendor client.
//!
//! # Design
//! Calls are never retried, so each failure surfaces once, as one of these
//! variants. A non-2xx response keeps the status, the URL and the raw body
//! so callers can inspect what the vendor said.

use thiserror::Error;

/// Errors returned by the common helper and the vendor clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a status outside 200..=299.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout...).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body is not valid JSON.
    #[error("deserialization failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A field the vendor's pagination contract requires was absent.
    #[error("response is missing `{field}`")]
    MissingField { field: String },

    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// A batch result archive could not be read.
    #[error("cannot read batch results: {0}")]
    Archive(#[source] std::io::Error),

    /// Batch polling ran out of attempts before the batch finished.
    #[error("timeout expired while waiting for batch operation {batch_id}, last status: {last_status:?}")]
    Timeout {
        batch_id: String,
        last_status: Option<String>,
    },
}

impl ApiError {
    /// Status code of a non-2xx response, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
