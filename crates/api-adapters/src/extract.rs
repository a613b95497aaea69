//! Bearer-token authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use domains::{AppError, Subject};

use crate::error::ApiError;
use crate::state::AppState;

/// The verified principal for this request. Write handlers take it as an
/// argument; extraction failure short-circuits with 401.
pub struct AuthSubject(pub Subject);

impl FromRequestParts<AppState> for AuthSubject {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        let Some(token) = header_value.strip_prefix("Bearer ") else {
            return Err(AppError::Unauthenticated(
                "missing or invalid Authorization header".to_string(),
            )
            .into());
        };
        let subject = state.identity.verify_token(token.trim()).await?;
        Ok(AuthSubject(subject))
    }
}
