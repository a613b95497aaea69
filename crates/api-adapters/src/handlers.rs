//! HTTP handlers: validate shape, authenticate, rate-limit writes, call
//! the protocol services and shape masked responses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{AuthorMode, Comment, Profile, ReportTarget, Thread};
use serde::{Deserialize, Serialize};
use serde_json::json;
use services::{
    BlockDraft, CommentDraft, CommentSort, LoginDraft, Page, ProfileDraft, RefreshDraft,
    RegisterDraft, ReportDraft, ThreadDraft,
};

use crate::error::ApiResult;
use crate::extract::AuthSubject;
use crate::state::AppState;

/// Anonymous content never exposes its author over the API; the stored
/// record keeps the true uid for moderation tooling.
fn mask_author_uid(author_mode: AuthorMode, uid: String) -> Option<String> {
    match author_mode {
        AuthorMode::Anon => None,
        AuthorMode::Public => Some(uid),
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileOut {
    pub uid: String,
    pub display_name: String,
    pub username: String,
    pub allow_anonymous: bool,
    pub resume_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Profile> for ProfileOut {
    fn from(p: Profile) -> Self {
        Self {
            uid: p.uid,
            display_name: p.display_name,
            username: p.username,
            allow_anonymous: p.allow_anonymous,
            resume_url: p.resume_url,
            created_at: p.created_at.timestamp_micros(),
            updated_at: p.updated_at.timestamp_micros(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadOut {
    pub id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author_mode: AuthorMode,
    pub author_uid: Option<String>,
    pub comment_count: i64,
    pub last_activity: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Thread> for ThreadOut {
    fn from(t: Thread) -> Self {
        Self {
            id: t.id,
            title: t.title,
            body: t.body,
            tags: t.tags,
            author_mode: t.author_mode,
            author_uid: mask_author_uid(t.author_mode, t.author_uid),
            comment_count: t.comment_count,
            last_activity: t.last_activity.timestamp_micros(),
            created_at: t.created_at.timestamp_micros(),
            updated_at: t.updated_at.timestamp_micros(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentOut {
    pub id: String,
    pub body: String,
    pub author_mode: AuthorMode,
    pub author_uid: Option<String>,
    pub created_at: i64,
    pub score: f64,
}

impl From<Comment> for CommentOut {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            body: c.body,
            author_mode: c.author_mode,
            author_uid: mask_author_uid(c.author_mode, c.author_uid),
            created_at: c.created_at.timestamp_micros(),
            score: c.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageOut<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T, U: Into<T>> From<Page<U>> for PageOut<T> {
    fn from(page: Page<U>) -> Self {
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            next_page_token: page.next_page_token,
        }
    }
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ── Auth ─────────────────────────────────────────────────────────────────────

pub async fn register(
    State(state): State<AppState>,
    Json(draft): Json<RegisterDraft>,
) -> ApiResult<impl IntoResponse> {
    let (user, tokens) = state.auth.register(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "tokens": tokens })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(draft): Json<LoginDraft>,
) -> ApiResult<impl IntoResponse> {
    let tokens = state.auth.login(draft).await?;
    Ok(Json(json!({ "tokens": tokens })))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(draft): Json<RefreshDraft>,
) -> ApiResult<impl IntoResponse> {
    let tokens = state.auth.refresh(draft).await?;
    Ok(Json(json!({ "tokens": tokens })))
}

pub async fn me(
    State(state): State<AppState>,
    subject: AuthSubject,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.me(&subject.0).await?;
    Ok(Json(user))
}

// ── Profiles ─────────────────────────────────────────────────────────────────

pub async fn upsert_profile(
    State(state): State<AppState>,
    subject: AuthSubject,
    Json(draft): Json<ProfileDraft>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(&subject.0.uid)?;
    let (profile, created) = state.profiles.upsert(&subject.0.uid, draft).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ProfileOut::from(profile))))
}

// ── Threads ──────────────────────────────────────────────────────────────────

pub async fn create_thread(
    State(state): State<AppState>,
    subject: AuthSubject,
    Json(draft): Json<ThreadDraft>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(&subject.0.uid)?;
    let thread = state.threads.create(&subject.0.uid, draft).await?;
    Ok((StatusCode::CREATED, Json(ThreadOut::from(thread))))
}

#[derive(Debug, Deserialize)]
pub struct ThreadListParams {
    pub tag: Option<String>,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

pub async fn list_threads(
    State(state): State<AppState>,
    Query(params): Query<ThreadListParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .threads
        .list(params.tag, params.limit.unwrap_or(20), params.page_token.as_deref())
        .await?;
    Ok(Json(PageOut::<ThreadOut>::from(page)))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let thread = state.threads.get(&thread_id).await?;
    Ok(Json(ThreadOut::from(thread)))
}

// ── Comments ─────────────────────────────────────────────────────────────────

pub async fn add_comment(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    subject: AuthSubject,
    Json(draft): Json<CommentDraft>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(&subject.0.uid)?;
    let comment = state.comments.add(&thread_id, &subject.0.uid, draft).await?;
    Ok((StatusCode::CREATED, Json(CommentOut::from(comment))))
}

#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub sort: Option<String>,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Query(params): Query<CommentListParams>,
) -> ApiResult<impl IntoResponse> {
    let sort = CommentSort::parse(params.sort.as_deref().unwrap_or("new"))?;
    let page = state
        .comments
        .list(
            &thread_id,
            sort,
            params.limit.unwrap_or(20),
            params.page_token.as_deref(),
        )
        .await?;
    Ok(Json(PageOut::<CommentOut>::from(page)))
}

// ── Moderation ───────────────────────────────────────────────────────────────

pub async fn create_report(
    State(state): State<AppState>,
    subject: AuthSubject,
    Json(draft): Json<ReportDraft>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(&subject.0.uid)?;
    let report = state.moderation.report(&subject.0.uid, draft).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": report.id,
            "target_type": match report.target_type {
                ReportTarget::Thread => "thread",
                ReportTarget::Comment => "comment",
            },
            "target_id": report.target_id,
            "reason": report.reason,
            "created_at": report.created_at.timestamp_micros(),
        })),
    ))
}

pub async fn create_block(
    State(state): State<AppState>,
    subject: AuthSubject,
    Json(draft): Json<BlockDraft>,
) -> ApiResult<impl IntoResponse> {
    state.limiter.check(&subject.0.uid)?;
    let block = state.moderation.block(&subject.0.uid, draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "blocked_uid": block.blocked_uid,
            "created_at": block.created_at.timestamp_micros(),
        })),
    ))
}
