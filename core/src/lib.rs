//! Small, blocking REST clients for third-party SaaS APIs.
//!
//! # Overview
//! Each vendor client binds a base URL and credentials and exposes:
//! - `call`, one request in, decoded JSON out;
//! - `fetch_all` (where the vendor paginates), which follows that vendor's
//!   pagination until exhausted and returns the concatenated items.
//!
//! # Design
//! - `RestClient` is the shared helper: URL assembly, one HTTP call, status
//!   logging, error on non-2xx. No retries.
//! - Requests and responses cross a `Transport` as plain data, so every
//!   pagination loop can be driven by `ReplayTransport` in tests and by
//!   `UreqTransport` against the network.
//! - Pagination loops are per vendor on purpose; they follow contracts the
//!   vendors own.
//! - `CachedClient` memoizes GETs; `Expiring` holds the WordPress token.

pub mod cache;
pub mod common;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod vendors;

pub use cache::{CachedClient, Expiring};
pub use common::RestClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use request::{complete_url, Body, FilePart, Params, Request};
pub use transport::{ReplayTransport, Transport, UreqTransport};
pub use vendors::canvas::CanvasClient;
pub use vendors::clickup::ClickUpClient;
pub use vendors::directus::DirectusClient;
pub use vendors::eventbrite::EventbriteClient;
pub use vendors::fusionauth::FusionAuthClient;
pub use vendors::livestorm::LivestormClient;
pub use vendors::mailchimp::{BatchOperation, BatchOutcome, MailchimpBatch, MailchimpClient};
pub use vendors::pipedrive::PipedriveClient;
pub use vendors::prestashop::PrestaShopClient;
pub use vendors::wordpress::WordPressClient;
