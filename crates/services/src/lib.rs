//! # services
//!
//! Protocol logic for TechSpace: pagination cursors, rate limiting,
//! profile upserts, thread/comment writes and paginated listing. Every
//! service talks to the store through the `DocumentStore` port; nothing
//! here performs I/O of its own.

pub mod auth;
pub mod comments;
pub mod cursor;
pub mod moderation;
pub mod profiles;
pub mod rate_limit;
pub mod sanitize;
pub mod threads;

use serde::Serialize;

pub use auth::{AuthService, AuthUser, LoginDraft, RefreshDraft, RegisterDraft};
pub use comments::{CommentDraft, CommentService, CommentSort};
pub use cursor::Cursor;
pub use moderation::{BlockDraft, ModerationService, ReportDraft};
pub use profiles::{ProfileDraft, ProfileService};
pub use rate_limit::RateLimiter;
pub use sanitize::sanitize_markdown;
pub use threads::{ThreadDraft, ThreadService};

/// Collection paths in the document store.
pub const USERS: &str = "users";
/// Username uniqueness index: `usernames/{username_lower} -> {uid}`.
pub const USERNAMES: &str = "usernames";
pub const THREADS: &str = "threads";
pub const REPORTS: &str = "reports";
pub const BLOCKS: &str = "blocks";

/// Comments live in a sub-collection scoped under their parent thread.
pub fn comments_collection(thread_id: &str) -> String {
    format!("{THREADS}/{thread_id}/comments")
}

/// How many times a protocol retries a transaction that lost an
/// optimistic-concurrency race before giving up.
pub const MAX_TXN_ATTEMPTS: u32 = 5;

/// One page of a listing plus the continuation token, when more remains.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
