//! Shared application state: the assembled services plus the injected
//! rate limiter. Cloning is cheap; everything inside is `Arc`-backed.

use std::sync::Arc;

use domains::{DocumentStore, IdentityProvider};
use services::{
    AuthService, CommentService, ModerationService, ProfileService, RateLimiter, ThreadService,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub profiles: ProfileService,
    pub threads: ThreadService,
    pub comments: CommentService,
    pub moderation: ModerationService,
    pub identity: Arc<dyn IdentityProvider>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let profiles = ProfileService::new(store.clone());
        Self {
            auth: AuthService::new(store.clone(), identity.clone(), profiles.clone()),
            profiles,
            threads: ThreadService::new(store.clone()),
            comments: CommentService::new(store.clone()),
            moderation: ModerationService::new(store),
            identity,
            limiter,
        }
    }
}
