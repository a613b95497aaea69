//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Subject, TokenBundle};

/// A stored document: generated id plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Sort direction for a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// What a range query orders on: a document field or the document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Field(String),
    DocId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub key: SortKey,
    pub dir: Direction,
}

impl OrderBy {
    pub fn desc(field: &str) -> Self {
        Self {
            key: SortKey::Field(field.to_string()),
            dir: Direction::Desc,
        }
    }

    pub fn doc_id_desc() -> Self {
        Self {
            key: SortKey::DocId,
            dir: Direction::Desc,
        }
    }
}

/// An ordered, filtered, limited range query with resume-after-key.
///
/// `start_after` values align positionally with `order_by` and resume the
/// scan strictly after that composite key in the declared sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub order_by: Vec<OrderBy>,
    /// Keep documents whose array field contains the given value.
    pub array_contains: Option<(String, Value)>,
    pub start_after: Option<Vec<Value>>,
    pub limit: usize,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: Vec::new(),
            array_contains: None,
            start_after: None,
            limit: usize::MAX,
        }
    }
}

/// Keyed collections of JSON documents with range queries and
/// optimistic multi-document transactions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Full overwrite (creates the document when absent).
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Shallow field merge; NotFound when the document is absent.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()>;

    async fn query(&self, query: Query) -> Result<Vec<Document>>;

    /// Begins a transaction with snapshot-read + conditional-write
    /// semantics over a small working set.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// A single optimistic transaction.
///
/// Reads record the observed document version; writes are buffered.
/// `commit` validates every recorded version and applies the write set
/// atomically, or fails with `AppError::TxnConflict` for the caller to
/// retry (bounded).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StoreTransaction: Send {
    /// Snapshot read with read-your-writes over the buffered write set.
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>>;

    fn set(&mut self, collection: &str, id: &str, data: Value);

    fn update(&mut self, collection: &str, id: &str, fields: Value);

    /// Consumes the transaction logically; the handle must not be reused
    /// after this returns.
    async fn commit(&mut self) -> Result<()>;
}

/// The managed identity provider, treated as a black-box collaborator.
///
/// Errors form a closed set: bad credentials or an unverifiable token map
/// to `Unauthenticated`, an already-registered email to `Conflict`, and
/// transport failures to `Upstream`. Call sites pattern-match instead of
/// catching broad failure classes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, id_token: &str) -> Result<Subject>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<TokenBundle>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle>;

    /// Returns the new subject id, or `Conflict` when the email exists.
    async fn create_user(&self, email: &str, password: &str, display_name: &str)
        -> Result<String>;
}
