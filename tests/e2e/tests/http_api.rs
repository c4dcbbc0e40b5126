//! HTTP façade tests: routing, validation, status mapping

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::util::ServiceExt;

use vim_deepl_core::Services;
use vim_deepl_e2e_tests::{FakeDictionary, FakeTranslator, test_config};
use vim_deepl_server::{AppState, build_router};

fn build_app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let services = Services::with_providers(
        &cfg,
        Arc::new(FakeTranslator::new("EN").with_response("apple", "яблоко")),
        Arc::new(FakeDictionary::for_term("apple")),
    )
    .unwrap();
    let app = build_router(AppState {
        services: Arc::new(services),
    });
    (dir, app)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_entry_is_404() {
    let (_dir, app) = build_app();
    let response = app
        .oneshot(get("/entries?term=nope&dst_lang=RU"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Not found");
}

#[tokio::test]
async fn create_then_get_entry_bumps_count() {
    let (_dir, app) = build_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/entries",
            serde_json::json!({
                "term": "hund", "translation": "собака",
                "src_lang": "da", "dst_lang": "ru"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = app
        .clone()
        .oneshot(get("/entries?term=hund&dst_lang=RU"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["translation"], "собака");
    assert_eq!(body["src_lang"], "DA");
    assert_eq!(body["count"], 2);

    let response = app
        .oneshot(post_json("/entries/use?term=hund&src_lang=DA&dst_lang=RU", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn translate_word_over_http_returns_word_result() {
    let (_dir, app) = build_app();

    let response = app
        .oneshot(post_json(
            "/translate/word",
            serde_json::json!({"term": "apple", "target_lang": "RU", "src_hint": "EN"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "word");
    assert_eq!(body["text"], "яблоко");
    assert_eq!(body["from_cache"], false);
    assert_eq!(body["cache_source"], serde_json::Value::Null);
    assert!(body["mw_definitions"].is_object());
}

#[tokio::test]
async fn train_next_on_empty_deck_is_200_with_error_payload() {
    let (_dir, app) = build_app();
    let response = app
        .oneshot(post_json(
            "/train/next",
            serde_json::json!({"src_filter": "EN"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "train");
    assert!(body["error"].as_str().unwrap().contains("filter=EN"));
}

#[tokio::test]
async fn review_returns_next_item() {
    let (_dir, app) = build_app();

    // Seed one entry and pick it to create its card.
    app.clone()
        .oneshot(post_json(
            "/entries",
            serde_json::json!({
                "term": "apple", "translation": "яблоко",
                "src_lang": "EN", "dst_lang": "RU"
            }),
        ))
        .await
        .unwrap();
    let next = app
        .clone()
        .oneshot(post_json("/train/next", serde_json::json!({"src_filter": "EN"})))
        .await
        .unwrap();
    let card_id = body_json(next).await["card_id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/train/review",
            serde_json::json!({"card_id": card_id, "grade": 5, "src_filter": "EN"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "train");
    assert_eq!(body["card_id"].as_i64(), Some(card_id));
    assert_eq!(body["reps"], 1);
    assert_eq!(body["today_done"], 1);

    // Out-of-range grades map to 400/ARGS.
    let response = app
        .oneshot(post_json(
            "/train/review",
            serde_json::json!({"card_id": card_id, "grade": 7}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "ARGS");
}

#[tokio::test]
async fn audio_id_validation_rejects_path_characters() {
    let (_dir, app) = build_app();

    for bad in ["../etc/passwd", "a b", "a/b", "a\\b", "_leading", ""] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/mw/audio/play",
                serde_json::json!({"audio_id": bad}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "audio_id {bad:?}");
    }
}

#[tokio::test]
async fn mark_hard_requires_known_word() {
    let (_dir, app) = build_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/train/mark_hard",
            serde_json::json!({"word": "ghost", "src_filter": "EN"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post_json(
            "/train/mark_hard",
            serde_json::json!({"word": "x", "src_filter": "RU"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bookmarks_roundtrip_over_http() {
    let (dir, app) = build_app();
    let book = dir.path().join("book.txt");
    std::fs::write(&book, "line one\nline two\n").unwrap();
    let path = book.to_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/bookmarks/mark",
            serde_json::json!({
                "path": path, "lnum": 2, "col": 6, "length": 3,
                "term": "two", "kind": "f2"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert!(ack["fingerprint"].as_str().unwrap().len() == 64);

    let response = app
        .clone()
        .oneshot(get(&format!("/bookmarks/list?path={path}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["marks"].as_array().unwrap().len(), 1);
    assert_eq!(body["marks"][0]["term"], "two");

    // Zero positions are rejected before touching the filesystem.
    let response = app
        .oneshot(post_json(
            "/bookmarks/mark",
            serde_json::json!({
                "path": path, "lnum": 0, "col": 1, "length": 1,
                "term": "x", "kind": "f2"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
