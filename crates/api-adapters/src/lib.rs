//! # api-adapters
//!
//! The axum routing and orchestration layer for TechSpace.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full HTTP surface.
///
/// Mounted flat; the binary can nest it under a prefix if a deployment
/// ever needs one.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/me", get(handlers::me))
        .route("/profiles", post(handlers::upsert_profile))
        .route("/threads", post(handlers::create_thread).get(handlers::list_threads))
        .route("/threads/{thread_id}", get(handlers::get_thread))
        .route(
            "/threads/{thread_id}/comments",
            post(handlers::add_comment).get(handlers::list_comments),
        )
        .route("/reports", post(handlers::create_report))
        .route("/blocks", post(handlers::create_block))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
