//! REST client for the hosted identity toolkit.
//!
//! Password sign-in, refresh-token exchange, account creation and token
//! verification each map to one endpoint. Failures collapse into the
//! closed `AppError` set: rejected credentials or tokens become
//! `Unauthenticated`, a duplicate email becomes `Conflict`, and transport
//! problems become `Upstream`.

use std::time::Duration;

use async_trait::async_trait;
use domains::{AppError, IdentityProvider, Result, Subject, TokenBundle};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURETOKEN_BASE: &str = "https://securetoken.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestIdentityProvider {
    http: reqwest::Client,
    api_key: SecretString,
    identity_base: String,
    securetoken_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

#[derive(Deserialize)]
struct LookupResponse {
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

fn parse_expires(raw: &str) -> u64 {
    raw.parse().unwrap_or(3600)
}

impl RestIdentityProvider {
    pub fn new(api_key: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Upstream(format!("identity client init failed: {err}")))?;
        Ok(Self {
            http,
            api_key,
            identity_base: IDENTITY_BASE.to_string(),
            securetoken_base: SECURETOKEN_BASE.to_string(),
        })
    }

    /// Points the adapter at alternative endpoints (local emulator, tests).
    pub fn with_endpoints(mut self, identity_base: &str, securetoken_base: &str) -> Self {
        self.identity_base = identity_base.trim_end_matches('/').to_string();
        self.securetoken_base = securetoken_base.trim_end_matches('/').to_string();
        self
    }

    fn identity_url(&self, endpoint: &str) -> String {
        format!(
            "{}/accounts:{endpoint}?key={}",
            self.identity_base,
            self.api_key.expose_secret()
        )
    }

    async fn error_message(response: reqwest::Response) -> String {
        response
            .json::<UpstreamErrorBody>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| "unreadable upstream error".to_string())
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn verify_token(&self, id_token: &str) -> Result<Subject> {
        let response = self
            .http
            .post(self.identity_url("lookup"))
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("identity lookup failed: {err}")))?;
        if !response.status().is_success() {
            return Err(AppError::Unauthenticated("invalid token".to_string()));
        }
        let body: LookupResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("identity lookup body: {err}")))?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Unauthenticated("invalid token".to_string()))?;
        Ok(Subject {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<TokenBundle> {
        let response = self
            .http
            .post(self.identity_url("signInWithPassword"))
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("identity sign-in failed: {err}")))?;
        if !response.status().is_success() {
            return Err(AppError::Unauthenticated(
                "invalid email or password".to_string(),
            ));
        }
        let body: SignInResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("identity sign-in body: {err}")))?;
        Ok(TokenBundle {
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_in: parse_expires(&body.expires_in),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle> {
        let url = format!(
            "{}/token?key={}",
            self.securetoken_base,
            self.api_key.expose_secret()
        );
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("token refresh failed: {err}")))?;
        if !response.status().is_success() {
            return Err(AppError::Unauthenticated("invalid refresh token".to_string()));
        }
        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("token refresh body: {err}")))?;
        Ok(TokenBundle {
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_in: parse_expires(&body.expires_in),
        })
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String> {
        let response = self
            .http
            .post(self.identity_url("signUp"))
            .json(&json!({
                "email": email,
                "password": password,
                "displayName": display_name,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("identity sign-up failed: {err}")))?;
        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            if message.starts_with("EMAIL_EXISTS") {
                return Err(AppError::Conflict("email already registered".to_string()));
            }
            warn!(%message, "identity sign-up rejected");
            return Err(AppError::Upstream(format!("identity sign-up: {message}")));
        }
        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("identity sign-up body: {err}")))?;
        Ok(body.local_id)
    }
}
