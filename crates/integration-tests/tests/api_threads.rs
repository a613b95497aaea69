//! Thread creation and listing: pagination walks, tag filtering, and
//! anonymous author masking.

use axum::http::StatusCode;
use integration_tests::TestApp;
use serde_json::json;
use services::THREADS;

#[tokio::test]
async fn create_and_fetch_a_thread() {
    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;

    let (status, created) = app
        .post(
            "/threads",
            &token,
            json!({
                "title": "  Borrow checker happiness  ",
                "body": "Lifetimes <script>alert(1)</script> are <b>fine</b>",
                "tags": ["Rust", "ASYNC"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Borrow checker happiness");
    assert_eq!(created["author_uid"], "uid-1");
    assert_eq!(created["comment_count"], 0);
    // Tags are lowercased; markup is sanitized.
    assert_eq!(created["tags"], json!(["rust", "async"]));
    let body_html = created["body"].as_str().expect("body");
    assert!(!body_html.contains("<script>"));
    assert!(body_html.contains("<b>fine</b>"));

    let id = created["id"].as_str().expect("id");
    let (status, fetched) = app.get(&format!("/threads/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, body) = app.get("/threads/no-such-thread").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn listing_pages_newest_first_without_gaps() {
    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;

    for i in 0..7 {
        let (status, _) = app
            .post("/threads", &token, json!({ "title": format!("thread {i}") }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut seen = Vec::new();
    let mut path = "/threads?limit=3".to_string();
    loop {
        let (status, page) = app.get(&path).await;
        assert_eq!(status, StatusCode::OK);
        let items = page["items"].as_array().expect("items");
        assert!(items.len() <= 3);
        for item in items {
            seen.push(item["title"].as_str().expect("title").to_string());
        }
        match page.get("next_page_token").and_then(|t| t.as_str()) {
            Some(token) => path = format!("/threads?limit=3&page_token={token}"),
            None => break,
        }
    }

    let expected: Vec<String> = (0..7).rev().map(|i| format!("thread {i}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn tag_filter_narrows_the_listing() {
    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;

    app.post(
        "/threads",
        &token,
        json!({ "title": "tokio tips", "tags": ["async"] }),
    )
    .await;
    app.post(
        "/threads",
        &token,
        json!({ "title": "serde tricks", "tags": ["serde"] }),
    )
    .await;

    let (status, page) = app.get("/threads?tag=ASYNC").await;
    assert_eq!(status, StatusCode::OK);
    let items = page["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "tokio tips");
}

#[tokio::test]
async fn garbage_page_token_starts_from_the_beginning() {
    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;
    app.post("/threads", &token, json!({ "title": "only one" }))
        .await;

    let (status, page) = app.get("/threads?page_token=%21%21not-base64").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().expect("items").len(), 1);
}

#[tokio::test]
async fn anon_threads_mask_the_author_but_store_the_true_uid() {
    use domains::DocumentStore;

    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;

    let (status, created) = app
        .post(
            "/threads",
            &token,
            json!({ "title": "throwaway question", "author_mode": "anon" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["author_uid"].is_null());
    assert_eq!(created["author_mode"], "anon");

    let id = created["id"].as_str().expect("id");
    let (_, fetched) = app.get(&format!("/threads/{id}")).await;
    assert!(fetched["author_uid"].is_null());

    // Moderation tooling still sees who wrote it.
    let stored = app
        .store
        .get(THREADS, id)
        .await
        .expect("store read")
        .expect("stored thread");
    assert_eq!(stored.data["author_uid"], "uid-1");
}
