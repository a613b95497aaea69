//! Thin authentication layer over the managed identity provider.
//!
//! The provider owns passwords, tokens and email uniqueness; this service
//! validates payload shape, sequences the provider calls and keeps the
//! profile store in step with newly registered users.

use std::sync::Arc;

use domains::{AppError, DocumentStore, IdentityProvider, Result, Subject, TokenBundle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::profiles::{validate_username, ProfileDraft, ProfileService};
use crate::USERNAMES;

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;
const REGISTER_USERNAME_MAX: usize = 24;
const REFRESH_TOKEN_MIN: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDraft {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginDraft {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshDraft {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: String,
    pub username: String,
}

fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    let valid = trimmed.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    }) && !trimmed.contains(char::is_whitespace);
    if !valid {
        return Err(AppError::Validation("invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AppError::Validation(format!(
            "password must be {PASSWORD_MIN}-{PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileService,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        profiles: ProfileService,
    ) -> Self {
        Self {
            store,
            identity,
            profiles,
        }
    }

    /// Registers a new account: username availability is checked before any
    /// provider call, the provider enforces email uniqueness, and the
    /// profile upsert transaction closes the remaining username race.
    pub async fn register(&self, draft: RegisterDraft) -> Result<(AuthUser, TokenBundle)> {
        validate_email(&draft.email)?;
        validate_password(&draft.password)?;
        let username = draft.username.trim().to_string();
        validate_username(&username, 3, REGISTER_USERNAME_MAX)?;
        let display_name = draft.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::Validation("display_name cannot be empty".to_string()));
        }

        let username_lower = username.to_lowercase();
        if self.store.get(USERNAMES, &username_lower).await?.is_some() {
            return Err(AppError::Conflict("username already taken".to_string()));
        }

        let uid = self
            .identity
            .create_user(draft.email.trim(), &draft.password, &display_name)
            .await?;
        let tokens = self.identity.sign_in(draft.email.trim(), &draft.password).await?;

        self.profiles
            .upsert(
                &uid,
                ProfileDraft {
                    display_name: display_name.clone(),
                    username: username.clone(),
                    allow_anonymous: Some(true),
                    resume_url: None,
                },
            )
            .await?;
        info!(%uid, "account registered");

        Ok((
            AuthUser {
                uid,
                email: Some(draft.email.trim().to_string()),
                display_name,
                username,
            },
            tokens,
        ))
    }

    pub async fn login(&self, draft: LoginDraft) -> Result<TokenBundle> {
        validate_email(&draft.email)?;
        validate_password(&draft.password)?;
        self.identity.sign_in(draft.email.trim(), &draft.password).await
    }

    /// Exchanges a refresh token and re-verifies the minted id token before
    /// handing it out.
    pub async fn refresh(&self, draft: RefreshDraft) -> Result<TokenBundle> {
        if draft.refresh_token.chars().count() < REFRESH_TOKEN_MIN {
            return Err(AppError::Validation("refresh_token too short".to_string()));
        }
        let tokens = self.identity.refresh(&draft.refresh_token).await?;
        self.identity.verify_token(&tokens.id_token).await?;
        Ok(tokens)
    }

    pub async fn me(&self, subject: &Subject) -> Result<AuthUser> {
        let profile = self.profiles.get(&subject.uid).await?;
        Ok(AuthUser {
            uid: subject.uid.clone(),
            email: subject.email.clone(),
            display_name: profile.display_name,
            username: profile.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockIdentityProvider;
    use storage_adapters::MemoryStore;

    fn drafts() -> RegisterDraft {
        RegisterDraft {
            email: "ada@example.com".to_string(),
            password: "correcthorse".to_string(),
            display_name: "Ada".to_string(),
            username: "ada".to_string(),
        }
    }

    fn bundle() -> TokenBundle {
        TokenBundle {
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 3600,
        }
    }

    fn service(identity: MockIdentityProvider) -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        let profiles = ProfileService::new(store.clone());
        let svc = AuthService::new(store.clone(), Arc::new(identity), profiles);
        (store, svc)
    }

    #[tokio::test]
    async fn register_creates_profile_and_returns_tokens() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_create_user()
            .returning(|_, _, _| Ok("uid-1".to_string()));
        identity.expect_sign_in().returning(|_, _| Ok(bundle()));
        let (store, svc) = service(identity);

        let (user, tokens) = svc.register(drafts()).await.unwrap();
        assert_eq!(user.uid, "uid-1");
        assert_eq!(tokens.expires_in, 3600);

        use domains::DocumentStore;
        assert!(store.get(crate::USERS, "uid-1").await.unwrap().is_some());
        assert!(store.get(USERNAMES, "ada").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn taken_username_conflicts_before_any_provider_call() {
        let mut identity = MockIdentityProvider::new();
        // No provider expectations: any call would panic the test.
        identity.expect_create_user().never();
        identity.expect_sign_in().never();
        let (store, svc) = service(identity);

        use domains::DocumentStore;
        store
            .set(USERNAMES, "ada", serde_json::json!({"uid": "someone"}))
            .await
            .unwrap();

        let err = svc.register(drafts()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn refresh_verifies_the_minted_token() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_refresh().returning(|_| Ok(bundle()));
        identity
            .expect_verify_token()
            .returning(|_| Err(AppError::Unauthenticated("expired".to_string())));
        let (_, svc) = service(identity);

        let err = svc
            .refresh(RefreshDraft {
                refresh_token: "0123456789abc".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn register_validates_shape_first() {
        let identity = MockIdentityProvider::new();
        let (_, svc) = service(identity);

        let mut bad = drafts();
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            svc.register(bad).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut bad = drafts();
        bad.password = "short".to_string();
        assert!(matches!(
            svc.register(bad).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut bad = drafts();
        bad.username = "this_username_is_way_too_long".to_string();
        assert!(matches!(
            svc.register(bad).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }
}
