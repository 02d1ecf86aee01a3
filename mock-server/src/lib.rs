//! A sandbox imitating the vendor APIs the clients talk to.
//!
//! Every vendor gets a route prefix (`/canvas`, `/mailchimp`, ...) serving
//! the same fixed collection of `ITEM_COUNT` items through that vendor's
//! pagination dialect. Absolute URLs (Canvas links, Mailchimp result
//! archives) are built from the request's `Host` header.
//!
//! Every request is counted by path and query; `GET /hits?uri=...` reports
//! how often a given URI was served.

use std::{
    collections::HashMap,
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const ITEM_COUNT: usize = 7;
/// Page size of the dialects where the server picks it.
pub const SERVER_PAGE_SIZE: usize = 3;
pub const PIPEDRIVE_TOKEN: &str = "pipedrive-token";
pub const WORDPRESS_KEY: &str = "wp-key";
pub const WORDPRESS_SECRET: &str = "wp-secret";
pub const WORDPRESS_JWT: &str = "wp-jwt";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: usize,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Batch {
    pub operations: Vec<Value>,
    pub polls: usize,
}

#[derive(Default)]
pub struct Sandbox {
    pub items: Vec<Item>,
    pub batches: RwLock<HashMap<String, Batch>>,
    pub tokens_issued: AtomicUsize,
    /// Requests served, keyed by path and query.
    pub hits: RwLock<HashMap<String, usize>>,
}

pub type Db = Arc<Sandbox>;

type Params = Query<HashMap<String, String>>;

pub fn app() -> Router {
    let items = (1..=ITEM_COUNT)
        .map(|id| Item {
            id,
            name: format!("item-{id}"),
        })
        .collect();
    let db: Db = Arc::new(Sandbox {
        items,
        ..Sandbox::default()
    });
    Router::new()
        .route("/canvas/api/v1/courses", get(canvas_courses))
        .route("/directus/items/articles", get(directus_articles))
        .route("/eventbrite/events", get(eventbrite_events))
        .route("/fusionauth/api/user/search", get(fusionauth_users))
        .route("/livestorm/events", get(livestorm_events))
        .route("/mailchimp/lists", get(mailchimp_lists))
        .route("/mailchimp/batches", post(mailchimp_create_batch))
        .route("/mailchimp/batches/{id}", get(mailchimp_get_batch))
        .route("/mailchimp/batch-results/{id}", get(mailchimp_batch_results))
        .route("/pipedrive/deals", get(pipedrive_deals))
        .route("/prestashop/products", get(prestashop_products))
        .route("/wordpress/wp/v2/token", post(wordpress_token))
        .route("/wordpress/wp/v2/posts", get(wordpress_posts))
        .route("/wordpress/stats", get(wordpress_stats))
        .route("/hits", get(hits))
        .layer(middleware::from_fn_with_state(db.clone(), count_hits))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn count_hits(State(db): State<Db>, request: Request, next: Next) -> Response {
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    *db.hits.write().await.entry(uri).or_default() += 1;
    next.run(request).await
}

async fn hits(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let uri = params.get("uri").map(String::as_str).unwrap_or_default();
    let hits = db.hits.read().await.get(uri).copied().unwrap_or(0);
    Json(json!({ "uri": uri, "hits": hits }))
}

fn window(items: &[Item], offset: usize, limit: usize) -> Vec<Item> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

fn number(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn host(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost")
        .to_string()
}

// --- canvas: link header, pages from 1 ---

async fn canvas_courses(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let page = number(&params, "page", 1).max(1);
    let per_page = number(&params, "per_page", 10).max(1);
    let last = db.items.len().div_ceil(per_page);
    let base = format!("http://{}/canvas/api/v1/courses", host(&headers));

    let mut links = vec![
        format!("<{base}?page={page}&per_page={per_page}>; rel=\"current\""),
        format!("<{base}?page=1&per_page={per_page}>; rel=\"first\""),
    ];
    if page < last {
        links.push(format!("<{base}?page={}&per_page={per_page}>; rel=\"next\"", page + 1));
    }
    links.push(format!("<{base}?page={last}&per_page={per_page}>; rel=\"last\""));

    let body = window(&db.items, (page - 1) * per_page, per_page);
    ([(header::LINK, links.join(","))], Json(body)).into_response()
}

// --- directus: offset + meta=filter_count ---

async fn directus_articles(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let offset = number(&params, "offset", 0);
    let limit = number(&params, "limit", 100);
    let mut body = json!({ "data": window(&db.items, offset, limit) });
    if params.get("meta").map(String::as_str) == Some("filter_count") {
        body["meta"] = json!({ "filter_count": db.items.len() });
    }
    Json(body)
}

// --- eventbrite: continuation tokens ---

async fn eventbrite_events(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let offset = params
        .get("continuation")
        .and_then(|c| c.strip_prefix("after-"))
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let page = window(&db.items, offset, SERVER_PAGE_SIZE);
    let next = offset + page.len();
    let has_more_items = next < db.items.len();
    let mut pagination = json!({ "object_count": db.items.len(), "has_more_items": has_more_items });
    if has_more_items {
        pagination["continuation"] = json!(format!("after-{next}"));
    }
    Json(json!({ "events": page, "pagination": pagination }))
}

// --- fusionauth: startRow / numberOfResults / total ---

async fn fusionauth_users(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let start_row = number(&params, "startRow", 0);
    let number_of_results = number(&params, "numberOfResults", 25);
    Json(json!({
        "total": db.items.len(),
        "users": window(&db.items, start_row, number_of_results),
    }))
}

// --- livestorm: page[number] from 0, meta.page_count ---

async fn livestorm_events(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let page = number(&params, "page[number]", 0);
    let page_count = db.items.len().div_ceil(SERVER_PAGE_SIZE);
    Json(json!({
        "data": window(&db.items, page * SERVER_PAGE_SIZE, SERVER_PAGE_SIZE),
        "meta": { "page_count": page_count, "record_count": db.items.len() },
    }))
}

// --- mailchimp: count / offset / total_items, batches ---

async fn mailchimp_lists(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let count = number(&params, "count", 10);
    let offset = number(&params, "offset", 0);
    Json(json!({
        "lists": window(&db.items, offset, count),
        "total_items": db.items.len(),
    }))
}

#[derive(Deserialize)]
pub struct CreateBatch {
    pub operations: Vec<Value>,
}

async fn mailchimp_create_batch(
    State(db): State<Db>,
    Json(input): Json<CreateBatch>,
) -> Json<Value> {
    let id = Uuid::new_v4().simple().to_string();
    let total = input.operations.len();
    db.batches.write().await.insert(
        id.clone(),
        Batch {
            operations: input.operations,
            polls: 0,
        },
    );
    Json(json!({ "id": id, "status": "pending", "total_operations": total }))
}

/// Reports `started` on the first poll and `finished` afterwards.
async fn mailchimp_get_batch(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut batches = db.batches.write().await;
    let batch = batches.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    batch.polls += 1;
    if batch.polls < 2 {
        return Ok(Json(json!({ "id": id, "status": "started" })));
    }
    let url = format!("http://{}/mailchimp/batch-results/{id}", host(&headers));
    Ok(Json(json!({
        "id": id,
        "status": "finished",
        "total_operations": batch.operations.len(),
        "response_body_url": url,
    })))
}

/// One result per operation: 200 echoing the body, 400 for paths that
/// contain `invalid`.
async fn mailchimp_batch_results(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Response, StatusCode> {
    let batches = db.batches.read().await;
    let batch = batches.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let results: Vec<Value> = batch
        .operations
        .iter()
        .map(|op| {
            let path = op["path"].as_str().unwrap_or_default();
            if path.contains("invalid") {
                json!({ "status_code": 400, "operation_id": null, "response": "{\"title\":\"Invalid Resource\"}" })
            } else {
                json!({ "status_code": 200, "operation_id": null, "response": op["body"] })
            }
        })
        .collect();
    let archive = results_archive(&id, &results).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(([(header::CONTENT_TYPE, "application/x-gzip")], archive).into_response())
}

/// A gzip-compressed tar holding the results as one JSON file.
pub fn results_archive(id: &str, results: &[Value]) -> std::io::Result<Vec<u8>> {
    let content = serde_json::to_vec(results)?;
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, format!("{id}.json"), content.as_slice())?;
    let tarball = builder.into_inner()?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tarball)?;
    encoder.finish()
}

// --- pipedrive: api_token, start, more_items_in_collection ---

async fn pipedrive_deals(
    State(db): State<Db>,
    Query(params): Params,
) -> Result<Json<Value>, StatusCode> {
    if params.get("api_token").map(String::as_str) != Some(PIPEDRIVE_TOKEN) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let start = number(&params, "start", 0);
    let limit = number(&params, "limit", SERVER_PAGE_SIZE);
    let page = window(&db.items, start, limit);
    let more = start + page.len() < db.items.len();
    let data = if page.is_empty() { Value::Null } else { json!(page) };
    Ok(Json(json!({
        "success": true,
        "data": data,
        "additional_data": {
            "pagination": {
                "start": start,
                "limit": limit,
                "more_items_in_collection": more,
            }
        }
    })))
}

// --- prestashop: limit=index,count ---

async fn prestashop_products(State(db): State<Db>, Query(params): Params) -> Json<Value> {
    let (index, count) = params
        .get("limit")
        .and_then(|l| l.split_once(','))
        .and_then(|(i, c)| Some((i.parse().ok()?, c.parse().ok()?)))
        .unwrap_or((0, db.items.len()));
    let page = window(&db.items, index, count);
    if page.is_empty() {
        // PrestaShop answers an empty array, not an empty object.
        return Json(json!([]));
    }
    Json(json!({ "products": page }))
}

// --- wordpress: jwt token, page / total_pages ---

#[derive(Deserialize)]
pub struct TokenForm {
    pub api_key: String,
    pub api_secret: String,
}

async fn wordpress_token(
    State(db): State<Db>,
    Form(form): Form<TokenForm>,
) -> Result<Json<Value>, StatusCode> {
    if form.api_key != WORDPRESS_KEY || form.api_secret != WORDPRESS_SECRET {
        return Err(StatusCode::FORBIDDEN);
    }
    db.tokens_issued.fetch_add(1, Ordering::SeqCst);
    Ok(Json(json!({
        "access_token": WORDPRESS_JWT,
        "token_type": "Bearer",
        "exp": 3600,
        "refresh_token": "wp-refresh",
    })))
}

async fn wordpress_posts(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Result<Json<Value>, StatusCode> {
    let expected = format!("Bearer {WORDPRESS_JWT}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let page = number(&params, "page", 1).max(1);
    let per_page = number(&params, "per_page", 10).max(1);
    Ok(Json(json!({
        "posts": window(&db.items, (page - 1) * per_page, per_page),
        "total_pages": db.items.len().div_ceil(per_page),
    })))
}

async fn wordpress_stats(State(db): State<Db>) -> Json<Value> {
    Json(json!({ "tokens_issued": db.tokens_issued.load(Ordering::SeqCst) }))
}
