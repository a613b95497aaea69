//! Profile upsert: create vs. update status codes, username immutability,
//! and case-insensitive uniqueness.

use axum::http::StatusCode;
use integration_tests::TestApp;
use serde_json::json;

fn profile_body(username: &str) -> serde_json::Value {
    json!({ "display_name": "Ada Lovelace", "username": username })
}

#[tokio::test]
async fn upsert_requires_a_token() {
    let app = TestApp::new();
    let (status, _) = app.post_anon("/profiles", profile_body("ada")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_upsert_creates_later_upserts_update() {
    let app = TestApp::new();
    let token = app.token_for("uid-1");

    let (status, created) = app.post("/profiles", &token, profile_body("ada")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["uid"], "uid-1");
    assert_eq!(created["username"], "ada");
    assert_eq!(created["allow_anonymous"], true);
    // Normalized internals stay internal.
    assert!(created.get("username_lower").is_none());

    let (status, updated) = app
        .post(
            "/profiles",
            &token,
            json!({
                "display_name": "Countess of Lovelace",
                "username": "ada",
                "allow_anonymous": true,
                "resume_url": "https://example.com/ada.pdf",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["display_name"], "Countess of Lovelace");
    assert_eq!(updated["allow_anonymous"], true);
    assert_eq!(updated["resume_url"], "https://example.com/ada.pdf");
    assert_eq!(updated["created_at"], created["created_at"]);
}

#[tokio::test]
async fn username_is_immutable_even_by_case() {
    let app = TestApp::new();
    let token = app.seed_user("uid-1", "ada").await;

    let (status, body) = app.post("/profiles", &token, profile_body("ada_v2")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = app.post("/profiles", &token, profile_body("Ada")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn usernames_are_unique_case_insensitively() {
    let app = TestApp::new();
    app.seed_user("uid-1", "ada").await;

    let other = app.token_for("uid-2");
    let (status, _) = app.post("/profiles", &other, profile_body("ADA")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.post("/profiles", &other, profile_body("grace")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_usernames_are_422() {
    let app = TestApp::new();
    let token = app.token_for("uid-1");

    for bad in ["ab", "has space", "dash-ed", "ümlaut"] {
        let (status, body) = app.post("/profiles", &token, profile_body(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "username {bad:?}");
        assert_eq!(body["code"], "validation_failed");
    }

    let (status, _) = app
        .post(
            "/profiles",
            &token,
            json!({ "display_name": "", "username": "ada" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
