//! Profile upsert protocol.
//!
//! Case-insensitive username uniqueness is enforced through an index
//! collection (`usernames/{username_lower}` holding the owning uid) read
//! and written inside the same transaction as the profile document, so two
//! concurrent upserts cannot both observe "no conflict" and commit.

use std::sync::Arc;

use chrono::Utc;
use domains::{AppError, DocumentStore, Profile, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{MAX_TXN_ATTEMPTS, USERNAMES, USERS};

const DISPLAY_NAME_MAX: usize = 120;
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDraft {
    pub display_name: String,
    pub username: String,
    #[serde(default)]
    pub allow_anonymous: Option<bool>,
    #[serde(default)]
    pub resume_url: Option<String>,
}

impl ProfileDraft {
    fn normalized(mut self) -> Result<Self> {
        self.display_name = self.display_name.trim().to_string();
        if self.display_name.is_empty() {
            return Err(AppError::Validation("display_name cannot be empty".to_string()));
        }
        if self.display_name.chars().count() > DISPLAY_NAME_MAX {
            return Err(AppError::Validation(format!(
                "display_name longer than {DISPLAY_NAME_MAX} characters"
            )));
        }
        self.username = self.username.trim().to_string();
        validate_username(&self.username, USERNAME_MIN, USERNAME_MAX)?;
        if let Some(url) = self.resume_url.take() {
            let url = url.trim();
            if !url.is_empty() {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(AppError::Validation(
                        "resume_url must start with http:// or https://".to_string(),
                    ));
                }
                self.resume_url = Some(url.to_string());
            }
        }
        Ok(self)
    }
}

pub(crate) fn validate_username(username: &str, min: usize, max: usize) -> Result<()> {
    let len = username.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "username must be {min}-{max} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::Validation(
            "username may contain only letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates or updates the caller's profile. Returns the stored profile
    /// and whether this call created it (drives 201 vs 200 upstream).
    ///
    /// The username is immutable once set: any change, including a
    /// case-only one, is a conflict.
    pub async fn upsert(&self, uid: &str, draft: ProfileDraft) -> Result<(Profile, bool)> {
        let draft = draft.normalized()?;
        let username_lower = draft.username.to_lowercase();

        for _ in 0..MAX_TXN_ATTEMPTS {
            let mut tx = self.store.begin().await?;
            let existing = tx.get(USERS, uid).await?;
            let claim = tx.get(USERNAMES, &username_lower).await?;
            let now = Utc::now();

            let outcome = match existing {
                Some(doc) => {
                    let stored: Profile = serde_json::from_value(doc.data)?;
                    if stored.username != draft.username {
                        return Err(AppError::Conflict(
                            "username cannot be changed once set".to_string(),
                        ));
                    }
                    let profile = Profile {
                        uid: uid.to_string(),
                        display_name: draft.display_name.clone(),
                        username: stored.username,
                        username_lower: stored.username_lower,
                        allow_anonymous: draft.allow_anonymous.unwrap_or(true),
                        resume_url: draft.resume_url.clone(),
                        created_at: stored.created_at,
                        updated_at: now,
                    };
                    tx.set(USERS, uid, serde_json::to_value(&profile)?);
                    (profile, false)
                }
                None => {
                    if let Some(doc) = claim {
                        let owner = doc.data.get("uid").and_then(|v| v.as_str()).unwrap_or("");
                        if owner != uid {
                            return Err(AppError::Conflict("username already taken".to_string()));
                        }
                    }
                    let profile = Profile {
                        uid: uid.to_string(),
                        display_name: draft.display_name.clone(),
                        username: draft.username.clone(),
                        username_lower: username_lower.clone(),
                        allow_anonymous: draft.allow_anonymous.unwrap_or(true),
                        resume_url: draft.resume_url.clone(),
                        created_at: now,
                        updated_at: now,
                    };
                    tx.set(USERS, uid, serde_json::to_value(&profile)?);
                    tx.set(USERNAMES, &username_lower, json!({ "uid": uid }));
                    (profile, true)
                }
            };

            match tx.commit().await {
                Ok(()) => return Ok(outcome),
                Err(AppError::TxnConflict) => {
                    debug!(uid, "profile upsert lost a concurrent-commit race, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Internal(
            "profile upsert kept conflicting with concurrent writes".to_string(),
        ))
    }

    pub async fn get(&self, uid: &str) -> Result<Profile> {
        let doc = self
            .store
            .get(USERS, uid)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".to_string(), uid.to_string()))?;
        Ok(serde_json::from_value(doc.data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_adapters::MemoryStore;

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(MemoryStore::new()))
    }

    fn draft(display_name: &str, username: &str) -> ProfileDraft {
        ProfileDraft {
            display_name: display_name.to_string(),
            username: username.to_string(),
            allow_anonymous: None,
            resume_url: None,
        }
    }

    #[tokio::test]
    async fn first_upsert_creates_second_updates() {
        let svc = service();
        let (created, was_created) = svc.upsert("u1", draft("Ada", "ada_l")).await.unwrap();
        assert!(was_created);

        let (updated, was_created) = svc.upsert("u1", draft("Ada L.", "ada_l")).await.unwrap();
        assert!(!was_created);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.display_name, "Ada L.");
    }

    #[tokio::test]
    async fn username_collision_is_conflict_regardless_of_case() {
        let svc = service();
        svc.upsert("u1", draft("Ada", "Ada")).await.unwrap();

        let err = svc.upsert("u2", draft("Imposter", "ada")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = svc.upsert("u2", draft("Imposter", "ADA")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn username_is_immutable_even_for_case_changes() {
        let svc = service();
        svc.upsert("u1", draft("Ada", "ada")).await.unwrap();

        let err = svc.upsert("u1", draft("Ada", "Ada")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = svc.upsert("u1", draft("Ada", "lovelace")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn interleaved_creates_for_same_username_commit_once() {
        let store = Arc::new(MemoryStore::new());
        let svc = ProfileService::new(store.clone());

        // Drive the race through the store directly: both transactions read
        // before either commits.
        use domains::DocumentStore;
        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        assert!(tx1.get(USERNAMES, "ada").await.unwrap().is_none());
        assert!(tx2.get(USERNAMES, "ada").await.unwrap().is_none());
        tx1.set(USERS, "u1", serde_json::json!({"uid": "u1"}));
        tx1.set(USERNAMES, "ada", serde_json::json!({"uid": "u1"}));
        tx2.set(USERS, "u2", serde_json::json!({"uid": "u2"}));
        tx2.set(USERNAMES, "ada", serde_json::json!({"uid": "u2"}));
        tx1.commit().await.unwrap();
        assert!(matches!(
            tx2.commit().await.unwrap_err(),
            AppError::TxnConflict
        ));

        // The retry path then surfaces a clean conflict to the loser.
        let err = svc.upsert("u2", draft("Two", "ada")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn validation_rejects_bad_fields() {
        let svc = service();
        let err = svc.upsert("u1", draft("   ", "ada")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = svc.upsert("u1", draft("Ada", "a!")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut bad_url = draft("Ada", "ada");
        bad_url.resume_url = Some("ftp://cv.example".to_string());
        let err = svc.upsert("u1", bad_url).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
