//! Comment writes and listing.
//!
//! Adding a comment and bumping the parent thread's denormalized
//! `comment_count` happen inside one transaction: both commit together or
//! neither does. Listing supports recency and score ordering with a
//! composite resume key for the latter.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    new_doc_id, AppError, AuthorMode, Comment, DocumentStore, OrderBy, Query, Result,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::cursor::Cursor;
use crate::sanitize::sanitize_markdown;
use crate::{comments_collection, Page, MAX_TXN_ATTEMPTS, THREADS};

const BODY_MAX: usize = 5000;
pub const COMMENT_PAGE_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSort {
    New,
    Top,
}

impl CommentSort {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "new" => Ok(Self::New),
            "top" => Ok(Self::Top),
            other => Err(AppError::Validation(format!(
                "sort must be 'new' or 'top', got '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Top => "top",
        }
    }
}

fn default_author_mode() -> AuthorMode {
    AuthorMode::Public
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentDraft {
    pub body: String,
    #[serde(default = "default_author_mode")]
    pub author_mode: AuthorMode,
}

impl CommentDraft {
    fn normalized(mut self) -> Result<Self> {
        self.body = self.body.trim().to_string();
        if self.body.is_empty() || self.body.chars().count() > BODY_MAX {
            return Err(AppError::Validation(format!(
                "body must be 1-{BODY_MAX} characters"
            )));
        }
        Ok(self)
    }
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn DocumentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates a comment under `thread_id` and increments the thread's
    /// `comment_count` in the same transaction. An absent thread aborts
    /// cleanly with NotFound; a lost commit race is retried bounded.
    pub async fn add(
        &self,
        thread_id: &str,
        author_uid: &str,
        draft: CommentDraft,
    ) -> Result<Comment> {
        let draft = draft.normalized()?;
        let body = sanitize_markdown(&draft.body);
        let collection = comments_collection(thread_id);

        for _ in 0..MAX_TXN_ATTEMPTS {
            let mut tx = self.store.begin().await?;
            let Some(doc) = tx.get(THREADS, thread_id).await? else {
                return Err(AppError::NotFound(
                    "thread".to_string(),
                    thread_id.to_string(),
                ));
            };
            let comment_count = doc
                .data
                .get("comment_count")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let now = Utc::now();
            tx.update(
                THREADS,
                thread_id,
                json!({
                    "comment_count": comment_count + 1,
                    "last_activity": now.timestamp_micros(),
                    "updated_at": now.timestamp_micros(),
                }),
            );
            let comment = Comment {
                id: new_doc_id(),
                body: body.clone(),
                author_uid: author_uid.to_string(),
                author_mode: draft.author_mode,
                created_at: now,
                score: 0.0,
            };
            tx.set(&collection, &comment.id, serde_json::to_value(&comment)?);

            match tx.commit().await {
                Ok(()) => return Ok(comment),
                Err(AppError::TxnConflict) => {
                    debug!(thread_id, "comment add lost a counter race, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Internal(
            "comment add kept conflicting with concurrent writes".to_string(),
        ))
    }

    /// Paginated listing. `new` orders by recency; `top` orders by score
    /// with recency as tie-break, and the continuation resumes strictly
    /// after the composite `(score, created_at, id)` key.
    pub async fn list(
        &self,
        thread_id: &str,
        sort: CommentSort,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Comment>> {
        if self.store.get(THREADS, thread_id).await?.is_none() {
            return Err(AppError::NotFound(
                "thread".to_string(),
                thread_id.to_string(),
            ));
        }

        let limit = limit.clamp(1, COMMENT_PAGE_MAX);
        let mut query = Query::new(comments_collection(thread_id));
        query.limit = limit + 1;
        query.order_by = match sort {
            CommentSort::New => vec![OrderBy::desc("created_at"), OrderBy::doc_id_desc()],
            CommentSort::Top => vec![
                OrderBy::desc("score"),
                OrderBy::desc("created_at"),
                OrderBy::doc_id_desc(),
            ],
        };
        if let Some(cursor) = page_token.and_then(Cursor::decode) {
            cursor.ensure_sort(Some(sort.as_str()))?;
            query.start_after = Some(match sort {
                CommentSort::New => vec![json!(cursor.ts), json!(cursor.id)],
                CommentSort::Top => vec![
                    json!(cursor.score.unwrap_or(0.0)),
                    json!(cursor.ts),
                    json!(cursor.id),
                ],
            });
        }

        let docs = self.store.query(query).await?;
        let mut items: Vec<Comment> = Vec::with_capacity(docs.len().min(limit));
        for doc in docs.iter().take(limit) {
            items.push(serde_json::from_value(doc.data.clone())?);
        }
        let next_page_token = (docs.len() > limit).then(|| {
            let boundary = &items[limit - 1];
            let cursor = Cursor::new(boundary.id.clone(), boundary.created_at.timestamp_micros())
                .with_sort(sort.as_str());
            match sort {
                CommentSort::New => cursor,
                CommentSort::Top => cursor.with_score(boundary.score),
            }
            .encode()
        });
        Ok(Page {
            items,
            next_page_token,
        })
    }
}
