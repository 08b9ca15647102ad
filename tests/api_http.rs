//! HTTP API tests, driven through the router without binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use newswire::config::Config;
use newswire::providers::ProviderRegistry;
use newswire::server::{router, AppState};
use newswire_core::store::memory::InMemoryArticleStore;
use newswire_core::{ArticleStore, ArticleUpsert, NoopObserver, UpsertPolicy};
use serde_json::Value;
use tower::ServiceExt;

async fn seeded_state(page_size: u32) -> (AppState, Arc<InMemoryArticleStore>) {
    let store = Arc::new(InMemoryArticleStore::new());
    for i in 0..20u32 {
        let mut u = ArticleUpsert::new(format!("http://x/{i:02}"), format!("Story number {i}"));
        u.source = Some(if i % 2 == 0 { "BBC" } else { "CNN" }.to_string());
        u.category = Some(if i < 5 { "tech" } else { "world" }.to_string());
        u.author = Some(format!("author{}", i % 3));
        u.published_at = Some(Utc.with_ymd_and_hms(2024, 5, 1 + i % 4, 12, 0, 0).unwrap());
        store.upsert_by_url(&u, UpsertPolicy::default()).await.unwrap();
    }

    let config: Config = toml::from_str(
        r#"
        [db]
        path = "unused.sqlite"
        [providers.newsapi]
        api_key = "k"
        "#,
    )
    .unwrap();
    let registry = ProviderRegistry::from_config(&config, Arc::new(NoopObserver)).unwrap();
    let state = AppState::new(store.clone(), Arc::new(registry), page_size);
    (state, store)
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_version() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn list_uses_configured_page_size() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(state, "/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 15);
    assert_eq!(body["meta"]["current_page"], 1);
    assert_eq!(body["meta"]["per_page"], 15);
    assert_eq!(body["meta"]["total"], 20);
    assert_eq!(body["meta"]["last_page"], 2);

    let first = &body["data"][0];
    assert!(first["id"].is_string());
    assert!(first["url"].is_string());
    assert!(first.get("image_url").is_some());
}

#[tokio::test]
async fn second_page_holds_the_rest() {
    let (state, _) = seeded_state(15).await;
    let (_, body) = get(state, "/articles?page=2").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["meta"]["current_page"], 2);
}

#[tokio::test]
async fn filters_combine() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(
        state,
        "/articles?source=BBC&category=tech&published_at=2024-05-01",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Even i < 5 with i % 4 == 0: 0 and 4.
    assert_eq!(body["meta"]["total"], 2);
    for article in body["data"].as_array().unwrap() {
        assert_eq!(article["source"], "BBC");
        assert_eq!(article["category"], "tech");
    }
}

#[tokio::test]
async fn title_and_author_filters() {
    let (state, _) = seeded_state(15).await;
    let (_, body) = get(state.clone(), "/articles?title=NUMBER%201").await;
    // "Story number 1" and 10..=19.
    assert_eq!(body["meta"]["total"], 11);

    let (_, body) = get(state, "/articles?author=author0").await;
    assert_eq!(body["meta"]["total"], 7);
}

#[tokio::test]
async fn blank_params_are_ignored() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(state, "/articles?source=&published_at=&page=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 20);
}

#[tokio::test]
async fn bad_date_and_page_are_rejected() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(state.clone(), "/articles?published_at=May%201").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = get(state.clone(), "/articles?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = get(state, "/articles?page=two").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_article_by_id() {
    let (state, store) = seeded_state(15).await;
    let article = store.find_by_url("http://x/07").await.unwrap().unwrap();

    let (status, body) = get(state.clone(), &format!("/articles/{}", article.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "http://x/07");
    assert_eq!(body["title"], "Story number 7");

    let (status, body) = get(state, "/articles/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn sources_report_configuration() {
    let (state, _) = seeded_state(15).await;
    let (status, body) = get(state, "/sources").await;
    assert_eq!(status, StatusCode::OK);
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0]["name"], "newsapi");
    assert_eq!(sources[0]["configured"], true);
}
