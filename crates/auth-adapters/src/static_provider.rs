//! In-process identity provider for development and tests.
//!
//! Accounts and tokens live in a mutex-guarded map; tokens are random and
//! meaningless outside this process. The binary falls back to this
//! provider when no identity API key is configured.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use domains::{AppError, IdentityProvider, Result, Subject, TokenBundle};
use uuid::Uuid;

struct Account {
    uid: String,
    password: String,
}

#[derive(Default)]
struct Inner {
    // email -> account
    accounts: HashMap<String, Account>,
    // id token -> subject
    tokens: HashMap<String, Subject>,
    // refresh token -> uid
    refresh: HashMap<String, String>,
}

#[derive(Default)]
pub struct StaticIdentityProvider {
    inner: Mutex<Inner>,
}

fn random_token() -> String {
    Uuid::now_v7().simple().to_string()
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Internal("identity mutex poisoned".to_string()))
    }

    /// Mints a bearer token for an arbitrary subject. Test seam.
    pub fn issue_token(&self, subject: Subject) -> String {
        let token = random_token();
        if let Ok(mut inner) = self.lock() {
            inner.tokens.insert(token.clone(), subject);
        }
        token
    }

    fn mint_bundle(inner: &mut Inner, subject: Subject) -> TokenBundle {
        let id_token = random_token();
        let refresh_token = random_token();
        inner.refresh.insert(refresh_token.clone(), subject.uid.clone());
        inner.tokens.insert(id_token.clone(), subject);
        TokenBundle {
            id_token,
            refresh_token,
            expires_in: 3600,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify_token(&self, id_token: &str) -> Result<Subject> {
        let inner = self.lock()?;
        inner
            .tokens
            .get(id_token)
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("invalid token".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<TokenBundle> {
        let mut inner = self.lock()?;
        let subject = match inner.accounts.get(email) {
            Some(account) if account.password == password => {
                let mut subject = Subject::new(account.uid.clone());
                subject.email = Some(email.to_string());
                subject.email_verified = Some(false);
                subject
            }
            _ => {
                return Err(AppError::Unauthenticated(
                    "invalid email or password".to_string(),
                ))
            }
        };
        Ok(Self::mint_bundle(&mut inner, subject))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle> {
        let mut inner = self.lock()?;
        let uid = inner
            .refresh
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("invalid refresh token".to_string()))?;
        Ok(Self::mint_bundle(&mut inner, Subject::new(uid)))
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        _display_name: &str,
    ) -> Result<String> {
        let mut inner = self.lock()?;
        if inner.accounts.contains_key(email) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        let uid = random_token();
        inner.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        Ok(uid)
    }
}
