//! Thread creation and listing.
//!
//! Listing orders on `last_activity` descending with the document id as a
//! tie-break, so threads sharing a timestamp are neither skipped nor
//! duplicated across page boundaries.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    new_doc_id, AppError, AuthorMode, DocumentStore, OrderBy, Query, Result, Thread,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::cursor::Cursor;
use crate::sanitize::sanitize_markdown;
use crate::{Page, THREADS};

const TITLE_MAX: usize = 120;
const BODY_MAX: usize = 5000;
const TAGS_MAX: usize = 5;
const TAG_MIN: usize = 2;
const TAG_MAX: usize = 20;
pub const THREAD_PAGE_MAX: usize = 50;

fn default_author_mode() -> AuthorMode {
    AuthorMode::Public
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadDraft {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_author_mode")]
    pub author_mode: AuthorMode,
}

impl ThreadDraft {
    fn normalized(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() || self.title.chars().count() > TITLE_MAX {
            return Err(AppError::Validation(format!(
                "title must be 1-{TITLE_MAX} characters"
            )));
        }
        self.body = self.body.trim().to_string();
        if self.body.chars().count() > BODY_MAX {
            return Err(AppError::Validation(format!(
                "body longer than {BODY_MAX} characters"
            )));
        }
        if self.tags.len() > TAGS_MAX {
            return Err(AppError::Validation(format!("at most {TAGS_MAX} tags")));
        }
        self.tags = self
            .tags
            .iter()
            .map(|tag| {
                let tag = tag.trim().to_lowercase();
                let len = tag.chars().count();
                if !(TAG_MIN..=TAG_MAX).contains(&len) {
                    return Err(AppError::Validation(format!(
                        "tags must be {TAG_MIN}-{TAG_MAX} characters"
                    )));
                }
                Ok(tag)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }
}

#[derive(Clone)]
pub struct ThreadService {
    store: Arc<dyn DocumentStore>,
}

impl ThreadService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Pure insert: no uniqueness constraints, counter starts at zero and
    /// all three timestamps coincide.
    pub async fn create(&self, author_uid: &str, draft: ThreadDraft) -> Result<Thread> {
        let draft = draft.normalized()?;
        let now = Utc::now();
        let thread = Thread {
            id: new_doc_id(),
            title: sanitize_markdown(&draft.title),
            body: sanitize_markdown(&draft.body),
            tags: draft.tags,
            author_uid: author_uid.to_string(),
            author_mode: draft.author_mode,
            comment_count: 0,
            last_activity: now,
            created_at: now,
            updated_at: now,
        };
        self.store
            .set(THREADS, &thread.id, serde_json::to_value(&thread)?)
            .await?;
        info!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    pub async fn get(&self, id: &str) -> Result<Thread> {
        let doc = self
            .store
            .get(THREADS, id)
            .await?
            .ok_or_else(|| AppError::NotFound("thread".to_string(), id.to_string()))?;
        Ok(serde_json::from_value(doc.data)?)
    }

    /// Paginated listing by recency, optionally filtered to one tag.
    /// A malformed `page_token` means "start from the beginning".
    pub async fn list(
        &self,
        tag: Option<String>,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Thread>> {
        let limit = limit.clamp(1, THREAD_PAGE_MAX);
        let mut query = Query::new(THREADS);
        query.order_by = vec![OrderBy::desc("last_activity"), OrderBy::doc_id_desc()];
        query.limit = limit + 1;
        if let Some(tag) = tag {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() {
                query.array_contains = Some(("tags".to_string(), Value::String(tag)));
            }
        }
        if let Some(cursor) = page_token.and_then(Cursor::decode) {
            cursor.ensure_sort(None)?;
            query.start_after = Some(vec![json!(cursor.ts), json!(cursor.id)]);
        }

        let docs = self.store.query(query).await?;
        let mut items: Vec<Thread> = Vec::with_capacity(docs.len().min(limit));
        for doc in docs.iter().take(limit) {
            items.push(serde_json::from_value(doc.data.clone())?);
        }
        let next_page_token = (docs.len() > limit).then(|| {
            let boundary = &items[limit - 1];
            Cursor::new(boundary.id.clone(), boundary.last_activity.timestamp_micros()).encode()
        });
        Ok(Page {
            items,
            next_page_token,
        })
    }
}
