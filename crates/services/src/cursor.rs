//! Opaque pagination cursors.
//!
//! A cursor is URL-safe base64 over a small JSON payload: the boundary
//! document's id, its primary sort value (microsecond timestamp), and for
//! score-ordered listings the tie-break score. Decoding is total: any
//! malformed token means "start from the beginning" rather than an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use domains::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    /// Primary sort value: epoch microseconds of the boundary document.
    pub ts: i64,
    /// Sort mode the cursor was issued under. Listing rejects a cursor
    /// replayed under a different sort instead of silently misordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Cursor {
    pub fn new(id: impl Into<String>, ts: i64) -> Self {
        Self {
            id: id.into(),
            ts,
            sort: None,
            score: None,
        }
    }

    pub fn with_sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn encode(&self) -> String {
        // Serialization of this struct cannot fail; an empty payload would
        // simply decode to None downstream.
        let raw = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Total decode: `None` for empty, truncated, non-base64 or
    /// non-cursor input.
    pub fn decode(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let raw = URL_SAFE_NO_PAD.decode(token.as_bytes()).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    /// A cursor that names a sort mode must match the requested one.
    /// Minimal cursors (no mode) are accepted as-is.
    pub fn ensure_sort(&self, expected: Option<&str>) -> Result<()> {
        match (self.sort.as_deref(), expected) {
            (None, _) => Ok(()),
            (Some(s), Some(e)) if s == e => Ok(()),
            (Some(s), _) => Err(AppError::Validation(format!(
                "page_token was issued for sort '{s}'"
            ))),
        }
    }
}
