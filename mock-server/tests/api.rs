use std::io::Read;

use axum::http::{self, Request, StatusCode};
use axum::Router;
use flate2::read::GzDecoder;
use http_body_util::BodyExt;
use mock_server::{app, Item, ITEM_COUNT, PIPEDRIVE_TOKEN, WORDPRESS_JWT};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(http::header::HOST, "sandbox.test")
        .body(String::new())
        .unwrap()
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let resp = app.clone().oneshot(get(uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
    body_json(resp).await
}

// --- canvas ---

#[tokio::test]
async fn canvas_links_to_next_page_until_last() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(get("/canvas/api/v1/courses?per_page=3"))
        .await
        .unwrap();
    let link = resp.headers()[http::header::LINK].to_str().unwrap().to_string();
    assert!(link.contains(
        "<http://sandbox.test/canvas/api/v1/courses?page=2&per_page=3>; rel=\"next\""
    ));
    let items: Vec<Item> = body_json(resp).await;
    assert_eq!(items.len(), 3);

    let resp = app
        .oneshot(get("/canvas/api/v1/courses?page=3&per_page=3"))
        .await
        .unwrap();
    let link = resp.headers()[http::header::LINK].to_str().unwrap();
    assert!(!link.contains("rel=\"next\""));
    assert!(link.contains("rel=\"last\""));
}

// --- directus ---

#[tokio::test]
async fn directus_reports_filter_count_on_request() {
    let app = app();
    let body = get_json(&app, "/directus/items/articles?limit=2&offset=6&meta=filter_count").await;
    assert_eq!(body["meta"]["filter_count"], ITEM_COUNT);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body = get_json(&app, "/directus/items/articles").await;
    assert!(body.get("meta").is_none());
}

// --- eventbrite ---

#[tokio::test]
async fn eventbrite_hands_out_continuation_tokens() {
    let app = app();
    let first = get_json(&app, "/eventbrite/events").await;
    assert_eq!(first["pagination"]["has_more_items"], true);
    let token = first["pagination"]["continuation"].as_str().unwrap().to_string();

    let second = get_json(&app, &format!("/eventbrite/events?continuation={token}")).await;
    assert_eq!(second["events"][0]["id"], 4);

    let last = get_json(&app, "/eventbrite/events?continuation=after-6").await;
    assert_eq!(last["pagination"]["has_more_items"], false);
    assert!(last["pagination"].get("continuation").is_none());
}

// --- fusionauth / livestorm / mailchimp ---

#[tokio::test]
async fn fusionauth_pages_by_start_row() {
    let body = get_json(&app(), "/fusionauth/api/user/search?startRow=5&numberOfResults=5").await;
    assert_eq!(body["total"], ITEM_COUNT);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn livestorm_counts_pages_from_zero() {
    let body = get_json(&app(), "/livestorm/events?page%5Bnumber%5D=2").await;
    assert_eq!(body["meta"]["page_count"], 3);
    assert_eq!(body["data"], json!([{"id": 7, "name": "item-7"}]));
}

#[tokio::test]
async fn mailchimp_lists_report_total_items() {
    let body = get_json(&app(), "/mailchimp/lists?count=4&offset=4").await;
    assert_eq!(body["total_items"], ITEM_COUNT);
    assert_eq!(body["lists"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn mailchimp_batch_finishes_on_second_poll_with_archive() {
    let app = app();
    let create = Request::builder()
        .method("POST")
        .uri("/mailchimp/batches")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(
            json!({"operations": [
                {"method": "POST", "path": "/lists/1/members", "body": "{\"email\":\"a@b.c\"}"},
                {"method": "POST", "path": "/lists/invalid/members", "body": "{}"},
            ]})
            .to_string(),
        )
        .unwrap();
    let batch: Value = body_json(app.clone().oneshot(create).await.unwrap()).await;
    let id = batch["id"].as_str().unwrap().to_string();
    assert_eq!(batch["status"], "pending");

    let first = get_json(&app, &format!("/mailchimp/batches/{id}")).await;
    assert_eq!(first["status"], "started");
    let second = get_json(&app, &format!("/mailchimp/batches/{id}")).await;
    assert_eq!(second["status"], "finished");
    assert_eq!(
        second["response_body_url"],
        format!("http://sandbox.test/mailchimp/batch-results/{id}")
    );

    let resp = app
        .oneshot(get(&format!("/mailchimp/batch-results/{id}")))
        .await
        .unwrap();
    let archive = body_bytes(resp).await;
    let mut tar = tar::Archive::new(GzDecoder::new(archive.as_ref()));
    let mut entry = tar.entries().unwrap().next().unwrap().unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    let results: Vec<Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(results[0]["status_code"], 200);
    assert_eq!(results[1]["status_code"], 400);
}

#[tokio::test]
async fn unknown_batch_is_404() {
    let resp = app().oneshot(get("/mailchimp/batches/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- pipedrive ---

#[tokio::test]
async fn pipedrive_requires_api_token() {
    let resp = app().oneshot(get("/pipedrive/deals")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pipedrive_sends_null_data_past_the_end() {
    let app = app();
    let body = get_json(&app, &format!("/pipedrive/deals?api_token={PIPEDRIVE_TOKEN}&start=6")).await;
    assert_eq!(body["additional_data"]["pagination"]["more_items_in_collection"], false);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body = get_json(&app, &format!("/pipedrive/deals?api_token={PIPEDRIVE_TOKEN}&start=9")).await;
    assert!(body["data"].is_null());
}

// --- prestashop ---

#[tokio::test]
async fn prestashop_answers_empty_array_past_the_end() {
    let app = app();
    let body = get_json(&app, "/prestashop/products?limit=5%2C5").await;
    assert_eq!(body["products"].as_array().unwrap().len(), 2);
    let body = get_json(&app, "/prestashop/products?limit=10%2C5").await;
    assert_eq!(body, json!([]));
}

// --- wordpress ---

#[tokio::test]
async fn wordpress_token_requires_valid_credentials() {
    let app = app();
    let form = |secret: &str| {
        Request::builder()
            .method("POST")
            .uri("/wordpress/wp/v2/token")
            .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("api_key=wp-key&api_secret={secret}"))
            .unwrap()
    };

    let resp = app.clone().oneshot(form("wrong")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.clone().oneshot(form("wp-secret")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    assert_eq!(token["access_token"], WORDPRESS_JWT);

    let stats = get_json(&app, "/wordpress/stats").await;
    assert_eq!(stats["tokens_issued"], 1);
}

#[tokio::test]
async fn wordpress_posts_require_bearer_token() {
    let app = app();
    let resp = app.clone().oneshot(get("/wordpress/wp/v2/posts")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .uri("/wordpress/wp/v2/posts?per_page=5&page=2")
        .header(http::header::AUTHORIZATION, format!("Bearer {WORDPRESS_JWT}"))
        .body(String::new())
        .unwrap();
    let body: Value = body_json(app.oneshot(authorized).await.unwrap()).await;
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);
}

// --- hits ---

#[tokio::test]
async fn hits_count_requests_by_uri() {
    let app = app();
    get_json(&app, "/fusionauth/api/user/search?queryString=a").await;
    get_json(&app, "/fusionauth/api/user/search?queryString=a").await;
    get_json(&app, "/fusionauth/api/user/search?queryString=b").await;

    let body = get_json(&app, "/hits?uri=%2Ffusionauth%2Fapi%2Fuser%2Fsearch%3FqueryString%3Da").await;
    assert_eq!(body["hits"], 2);
    let body = get_json(&app, "/hits?uri=%2Fnever").await;
    assert_eq!(body["hits"], 0);
}
