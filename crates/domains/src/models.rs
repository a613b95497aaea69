//! # Domain Models
//!
//! These structs represent the core entities of TechSpace.
//! Document ids are UUID v7 in simple (hex) form: lexicographic order
//! equals creation order, which the listing tie-break relies on.

use chrono::serde::ts_microseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a store document id.
pub fn new_doc_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Whether a post is attributed publicly or anonymously.
///
/// The stored record always retains the true `author_uid`; anonymity is
/// applied at the response-shaping boundary only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorMode {
    Public,
    Anon,
}

/// A user profile, keyed by the identity-provider-issued uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub uid: String,
    pub display_name: String,
    pub username: String,
    /// Lower-cased username; the global uniqueness key. Immutable once set.
    pub username_lower: String,
    pub allow_anonymous: bool,
    pub resume_url: Option<String>,
    #[serde(with = "ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

/// A discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Normalized (trimmed, lower-cased) tags, at most five.
    pub tags: Vec<String>,
    pub author_uid: String,
    pub author_mode: AuthorMode,
    /// Denormalized count of comment documents under this thread.
    /// Maintained only by the comment-add transaction.
    pub comment_count: i64,
    #[serde(with = "ts_microseconds")]
    pub last_activity: DateTime<Utc>,
    #[serde(with = "ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

/// A comment, owned by its parent thread and immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author_uid: String,
    pub author_mode: AuthorMode,
    #[serde(with = "ts_microseconds")]
    pub created_at: DateTime<Utc>,
    pub score: f64,
}

/// What a moderation report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    Thread,
    Comment,
}

/// An append-only moderation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub reporter_uid: String,
    pub target_type: ReportTarget,
    pub target_id: String,
    pub reason: String,
    #[serde(with = "ts_microseconds")]
    pub created_at: DateTime<Utc>,
    pub status: String,
}

/// A user-to-user block. The document key is the deterministic composite
/// `"{blocker_uid}__{blocked_uid}"`, giving idempotent upsert semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub blocker_uid: String,
    pub blocked_uid: String,
    #[serde(with = "ts_microseconds")]
    pub created_at: DateTime<Utc>,
}

impl Block {
    pub fn doc_id(blocker_uid: &str, blocked_uid: &str) -> String {
        format!("{blocker_uid}__{blocked_uid}")
    }
}

/// The authenticated principal, derived from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
}

impl Subject {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            email_verified: None,
        }
    }
}

/// Token material handed back by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}
