//! Shared harness for the end-to-end API tests: an in-memory store, the
//! in-process identity provider, and the assembled router driven through
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::StaticIdentityProvider;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use domains::{DocumentStore, IdentityProvider, Subject};
use serde_json::Value;
use services::RateLimiter;
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StaticIdentityProvider>,
}

impl TestApp {
    /// A rate limit high enough that only tests which exercise the
    /// limiter on purpose ever hit it.
    pub fn new() -> Self {
        Self::with_rate_limit(10_000)
    }

    pub fn with_rate_limit(limit: u32) -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::new());
        let state = AppState::new(
            store.clone() as Arc<dyn DocumentStore>,
            identity.clone() as Arc<dyn IdentityProvider>,
            Arc::new(RateLimiter::new(limit)),
        );
        let router = router(state, &["http://localhost:5173".to_string()]);
        Self {
            router,
            store,
            identity,
        }
    }

    /// Mints a bearer token for `uid` without going through /auth/register.
    pub fn token_for(&self, uid: &str) -> String {
        self.identity.issue_token(Subject::new(uid))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail at the transport level");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            // Axum's built-in extractor rejections reply in plain text;
            // carry those through as a JSON string so tests that only
            // check the status don't panic here.
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Request::get(path).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(path)
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(path)
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    pub async fn post_anon(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    /// Creates a profile for `uid` and returns its bearer token.
    pub async fn seed_user(&self, uid: &str, username: &str) -> String {
        let token = self.token_for(uid);
        let (status, _) = self
            .post(
                "/profiles",
                &token,
                serde_json::json!({
                    "display_name": format!("User {username}"),
                    "username": username,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seeding profile for {uid}");
        token
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
