//! Moderation writes: reports and blocks.
//!
//! Both are append-only. Blocks use the deterministic composite document
//! key `"{blocker}__{blocked}"`, so repeating a block is a natural upsert
//! and existence checks are a single get.

use std::sync::Arc;

use chrono::Utc;
use domains::{new_doc_id, AppError, Block, DocumentStore, Report, ReportTarget, Result};
use serde::Deserialize;
use tracing::info;

use crate::{BLOCKS, REPORTS};

const REASON_MIN: usize = 3;
const REASON_MAX: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportDraft {
    pub target_type: ReportTarget,
    pub target_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDraft {
    pub blocked_uid: String,
}

#[derive(Clone)]
pub struct ModerationService {
    store: Arc<dyn DocumentStore>,
}

impl ModerationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists a report for asynchronous moderation processing.
    pub async fn report(&self, reporter_uid: &str, draft: ReportDraft) -> Result<Report> {
        if draft.target_id.trim().is_empty() {
            return Err(AppError::Validation("target_id cannot be empty".to_string()));
        }
        let reason = draft.reason.trim().to_string();
        let len = reason.chars().count();
        if !(REASON_MIN..=REASON_MAX).contains(&len) {
            return Err(AppError::Validation(format!(
                "reason must be {REASON_MIN}-{REASON_MAX} characters"
            )));
        }

        let report = Report {
            id: new_doc_id(),
            reporter_uid: reporter_uid.to_string(),
            target_type: draft.target_type,
            target_id: draft.target_id,
            reason,
            created_at: Utc::now(),
            status: "open".to_string(),
        };
        self.store
            .set(REPORTS, &report.id, serde_json::to_value(&report)?)
            .await?;
        info!(report_id = %report.id, "report filed");
        Ok(report)
    }

    pub async fn block(&self, blocker_uid: &str, draft: BlockDraft) -> Result<Block> {
        let blocked_uid = draft.blocked_uid.trim().to_string();
        if blocked_uid.is_empty() {
            return Err(AppError::Validation("blocked_uid cannot be empty".to_string()));
        }
        if blocked_uid == blocker_uid {
            return Err(AppError::Validation("cannot block yourself".to_string()));
        }

        let block = Block {
            blocker_uid: blocker_uid.to_string(),
            blocked_uid,
            created_at: Utc::now(),
        };
        let doc_id = Block::doc_id(&block.blocker_uid, &block.blocked_uid);
        self.store
            .set(BLOCKS, &doc_id, serde_json::to_value(&block)?)
            .await?;
        Ok(block)
    }
}
