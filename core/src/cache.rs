//! In-memory caches.
//!
//! # Design
//! Both caches are single-threaded (`RefCell`) and live as long as their
//! owner:
//! - `CachedClient` memoizes GET calls by `(path, query, url)` and never
//!   invalidates anything.
//! - `Expiring<T>` keeps one value until a deadline derived from the value
//!   itself, e.g. the lifetime a token endpoint reports.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::common::RestClient;
use crate::error::ApiError;
use crate::request::Request;

type CacheKey = (String, String, Option<String>);

/// A `RestClient` whose GET results are remembered forever.
#[derive(Debug)]
pub struct CachedClient {
    inner: RestClient,
    entries: RefCell<HashMap<CacheKey, Option<Value>>>,
}

impl CachedClient {
    pub fn new(inner: RestClient) -> Self {
        Self {
            inner,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &RestClient {
        &self.inner
    }

    /// Same contract as `RestClient::call`. Only successful GETs are stored.
    pub fn call(&self, request: &Request) -> Result<Option<Value>, ApiError> {
        if !request.is_get() {
            return self.inner.call(request);
        }

        let key = (request.path.clone(), request.params.encode(), request.url.clone());
        if let Some(hit) = self.entries.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let result = self.inner.call(request)?;
        self.entries.borrow_mut().insert(key, result.clone());
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// A single cached value that expires. A lifetime too long to represent
/// as an `Instant` never expires.
#[derive(Debug)]
pub struct Expiring<T> {
    slot: RefCell<Option<(T, Option<Instant>)>>,
}

impl<T> Default for Expiring<T> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<T: Clone> Expiring<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value while it is fresh; otherwise `fetch` a new one and
    /// keep it for `lifetime(&value)`. A failed fetch leaves the slot alone.
    pub fn get_or_refresh<E>(
        &self,
        fetch: impl FnOnce() -> Result<T, E>,
        lifetime: impl FnOnce(&T) -> Duration,
    ) -> Result<T, E> {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }
        let value = fetch()?;
        let deadline = Instant::now().checked_add(lifetime(&value));
        *self.slot.borrow_mut() = Some((value.clone(), deadline));
        Ok(value)
    }

    /// The cached value if its deadline has not passed.
    pub fn fresh(&self) -> Option<T> {
        match &*self.slot.borrow() {
            Some((value, None)) => Some(value.clone()),
            Some((value, Some(deadline))) if Instant::now() < *deadline => Some(value.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::http::HttpResponse;
    use crate::transport::ReplayTransport;

    fn cached(transport: &Arc<ReplayTransport>) -> CachedClient {
        RestClient::new("https://api.example.com")
            .with_transport(transport.clone())
            .cached()
    }

    #[test]
    fn repeated_get_hits_the_cache() {
        let transport = Arc::new(ReplayTransport::new([HttpResponse::json(200, &json!({"n": 1}))]));
        let client = cached(&transport);
        let request = Request::get("/items").param("page", 1);

        assert_eq!(client.call(&request).unwrap(), Some(json!({"n": 1})));
        assert_eq!(client.call(&request).unwrap(), Some(json!({"n": 1})));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn different_params_are_different_entries() {
        let transport = Arc::new(ReplayTransport::new([
            HttpResponse::json(200, &json!(1)),
            HttpResponse::json(200, &json!(2)),
        ]));
        let client = cached(&transport);

        assert_eq!(client.call(&Request::get("/items").param("page", 1)).unwrap(), Some(json!(1)));
        assert_eq!(client.call(&Request::get("/items").param("page", 2)).unwrap(), Some(json!(2)));
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn non_get_requests_bypass_the_cache() {
        let transport = Arc::new(ReplayTransport::new([
            HttpResponse::json(201, &json!({"id": 1})),
            HttpResponse::json(201, &json!({"id": 2})),
        ]));
        let client = cached(&transport);
        let request = Request::post("/items").json(json!({"name": "a"}));

        assert_eq!(client.call(&request).unwrap(), Some(json!({"id": 1})));
        assert_eq!(client.call(&request).unwrap(), Some(json!({"id": 2})));
        assert!(client.is_empty());
    }

    #[test]
    fn failed_get_is_not_cached() {
        let transport = Arc::new(ReplayTransport::new([
            HttpResponse::text_body(500, "boom"),
            HttpResponse::json(200, &json!("ok")),
        ]));
        let client = cached(&transport);
        let request = Request::get("/flaky");

        assert!(client.call(&request).is_err());
        assert_eq!(client.call(&request).unwrap(), Some(json!("ok")));
    }

    #[test]
    fn expiring_reuses_fresh_value() {
        let cache = Expiring::new();
        let fetches = Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            Ok::<_, ApiError>(fetches.get())
        };

        assert_eq!(cache.get_or_refresh(fetch, |_| Duration::from_secs(60)).unwrap(), 1);
        assert_eq!(cache.get_or_refresh(fetch, |_| Duration::from_secs(60)).unwrap(), 1);
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn expiring_refreshes_after_deadline() {
        let cache = Expiring::new();
        let fetches = Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            Ok::<_, ApiError>(fetches.get())
        };

        assert_eq!(cache.get_or_refresh(fetch, |_| Duration::ZERO).unwrap(), 1);
        assert_eq!(cache.get_or_refresh(fetch, |_| Duration::ZERO).unwrap(), 2);
        assert_eq!(cache.fresh(), None);
    }

    #[test]
    fn unrepresentable_lifetime_never_expires() {
        let cache = Expiring::new();
        let value = cache
            .get_or_refresh(|| Ok::<_, ApiError>(u64::MAX), |v| Duration::from_secs(*v))
            .unwrap();

        assert_eq!(value, u64::MAX);
        assert_eq!(cache.fresh(), Some(u64::MAX));
    }

    #[test]
    fn failed_fetch_keeps_slot_empty() {
        let cache: Expiring<u32> = Expiring::new();
        let result = cache.get_or_refresh(
            || Err(ApiError::MissingField {
                field: "exp".to_string(),
            }),
            |_| Duration::from_secs(60),
        );
        assert!(result.is_err());
        assert_eq!(cache.fresh(), None);
    }
}
