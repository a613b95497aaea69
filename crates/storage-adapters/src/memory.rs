//! In-memory `DocumentStore` backed by versioned documents.
//!
//! Transactions are optimistic: reads record the observed document version,
//! writes are buffered, and commit validates the whole read set under one
//! lock before applying the write set. A commit that observes a changed
//! version fails with `TxnConflict` for the caller's bounded retry loop.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use domains::{
    AppError, Direction, Document, DocumentStore, OrderBy, Query, Result, SortKey,
    StoreTransaction,
};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
struct VersionedDoc {
    data: Value,
    version: u64,
}

#[derive(Default)]
struct Inner {
    // collection path -> id -> document
    collections: HashMap<String, HashMap<String, VersionedDoc>>,
}

impl Inner {
    fn doc(&self, collection: &str, id: &str) -> Option<&VersionedDoc> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    fn version(&self, collection: &str, id: &str) -> u64 {
        self.doc(collection, id).map(|d| d.version).unwrap_or(0)
    }

    fn put(&mut self, collection: &str, id: &str, data: Value) {
        let coll = self.collections.entry(collection.to_string()).or_default();
        let version = coll.get(id).map(|d| d.version).unwrap_or(0) + 1;
        coll.insert(id.to_string(), VersionedDoc { data, version });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Arc<Mutex<Inner>>) -> Result<MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|_| AppError::Internal("store mutex poisoned".to_string()))
}

/// Total order over the JSON scalars the store sorts on. Null sorts first;
/// numbers compare through f64, which is exact for the microsecond
/// timestamps and scores stored here.
fn cmp_scalar(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn key_value(doc: &Document, key: &SortKey) -> Value {
    match key {
        SortKey::Field(field) => doc.data.get(field).cloned().unwrap_or(Value::Null),
        SortKey::DocId => Value::String(doc.id.clone()),
    }
}

fn directed(ordering: Ordering, dir: Direction) -> Ordering {
    match dir {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

fn cmp_docs(a: &Document, b: &Document, order_by: &[OrderBy]) -> Ordering {
    for ob in order_by {
        let c = directed(cmp_scalar(&key_value(a, &ob.key), &key_value(b, &ob.key)), ob.dir);
        if c != Ordering::Equal {
            return c;
        }
    }
    Ordering::Equal
}

/// Position of `doc` relative to the cursor's composite key, in the sort
/// order the query declared. `Greater` means strictly after the cursor.
fn cmp_doc_to_cursor(doc: &Document, cursor: &[Value], order_by: &[OrderBy]) -> Ordering {
    for (ob, cursor_value) in order_by.iter().zip(cursor) {
        let c = directed(cmp_scalar(&key_value(doc, &ob.key), cursor_value), ob.dir);
        if c != Ordering::Equal {
            return c;
        }
    }
    Ordering::Equal
}

fn merge_fields(data: &mut Value, fields: &Value) {
    if let (Some(obj), Some(patch)) = (data.as_object_mut(), fields.as_object()) {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.lock()?;
        Ok(inner.doc(collection, id).map(|d| Document {
            id: id.to_string(),
            data: d.data.clone(),
        }))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let mut inner = self.lock()?;
        inner.put(collection, id, data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let mut inner = self.lock()?;
        let Some(doc) = inner.doc(collection, id) else {
            return Err(AppError::NotFound("document".to_string(), id.to_string()));
        };
        let mut data = doc.data.clone();
        merge_fields(&mut data, &fields);
        inner.put(collection, id, data);
        Ok(())
    }

    async fn query(&self, query: Query) -> Result<Vec<Document>> {
        let inner = self.lock()?;
        let mut docs: Vec<Document> = inner
            .collections
            .get(&query.collection)
            .map(|coll| {
                coll.iter()
                    .map(|(id, d)| Document {
                        id: id.clone(),
                        data: d.data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        drop(inner);

        if let Some((field, needle)) = &query.array_contains {
            docs.retain(|doc| {
                doc.data
                    .get(field)
                    .and_then(Value::as_array)
                    .is_some_and(|arr| arr.contains(needle))
            });
        }

        docs.sort_by(|a, b| cmp_docs(a, b, &query.order_by));

        if let Some(cursor) = &query.start_after {
            docs.retain(|doc| cmp_doc_to_cursor(doc, cursor, &query.order_by) == Ordering::Greater);
        }

        docs.truncate(query.limit);
        Ok(docs)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            reads: Vec::new(),
            writes: Vec::new(),
            committed: false,
        }))
    }
}

enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Update {
        collection: String,
        id: String,
        fields: Value,
    },
}

impl WriteOp {
    fn target(&self) -> (&str, &str) {
        match self {
            WriteOp::Set { collection, id, .. } | WriteOp::Update { collection, id, .. } => {
                (collection, id)
            }
        }
    }
}

pub struct MemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    // (collection, id, observed version); version 0 = absent
    reads: Vec<(String, String, u64)>,
    writes: Vec<WriteOp>,
    committed: bool,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>> {
        let base = {
            let inner = lock_inner(&self.inner)?;
            let version = inner.version(collection, id);
            if !self
                .reads
                .iter()
                .any(|(c, i, _)| c == collection && i == id)
            {
                self.reads
                    .push((collection.to_string(), id.to_string(), version));
            }
            inner.doc(collection, id).map(|d| d.data.clone())
        };

        // Read-your-writes: replay this transaction's buffered ops on top
        // of the snapshot.
        let mut current = base;
        for op in &self.writes {
            if op.target() != (collection, id) {
                continue;
            }
            match op {
                WriteOp::Set { data, .. } => current = Some(data.clone()),
                WriteOp::Update { fields, .. } => {
                    let mut data = current.unwrap_or_else(|| Value::Object(Default::default()));
                    merge_fields(&mut data, fields);
                    current = Some(data);
                }
            }
        }

        Ok(current.map(|data| Document {
            id: id.to_string(),
            data,
        }))
    }

    fn set(&mut self, collection: &str, id: &str, data: Value) {
        self.writes.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    fn update(&mut self, collection: &str, id: &str, fields: Value) {
        self.writes.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
    }

    async fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(AppError::Internal(
                "transaction committed twice".to_string(),
            ));
        }

        let mut inner = lock_inner(&self.inner)?;

        // Validate the read set before touching anything: commit is
        // all-or-nothing.
        for (collection, id, observed) in &self.reads {
            let current = inner.version(collection, id);
            if current != *observed {
                debug!(%collection, %id, observed, current, "transaction read set stale");
                return Err(AppError::TxnConflict);
            }
        }
        let mut created: HashSet<(String, String)> = HashSet::new();
        for op in &self.writes {
            let (collection, id) = op.target();
            if let WriteOp::Update { .. } = op {
                let exists = inner.doc(collection, id).is_some()
                    || created.contains(&(collection.to_string(), id.to_string()));
                if !exists {
                    return Err(AppError::NotFound("document".to_string(), id.to_string()));
                }
            }
            created.insert((collection.to_string(), id.to_string()));
        }

        for op in &self.writes {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => inner.put(collection, id, data.clone()),
                WriteOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    let mut data = inner
                        .doc(collection, id)
                        .map(|d| d.data.clone())
                        .unwrap_or_else(|| Value::Object(Default::default()));
                    merge_fields(&mut data, fields);
                    inner.put(collection, id, data);
                }
            }
        }

        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Query;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .set("threads", "t1", json!({"title": "hello"}))
            .await
            .unwrap();
        let doc = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(doc.data["title"], "hello");
        assert!(store.get("threads", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_and_requires_existence() {
        let store = MemoryStore::new();
        store
            .set("threads", "t1", json!({"title": "hello", "comment_count": 0}))
            .await
            .unwrap();
        store
            .update("threads", "t1", json!({"comment_count": 3}))
            .await
            .unwrap();
        let doc = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(doc.data["comment_count"], 3);
        assert_eq!(doc.data["title"], "hello");

        let err = store
            .update("threads", "nope", json!({"comment_count": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn query_orders_filters_and_resumes() {
        let store = MemoryStore::new();
        for (id, ts, tags) in [
            ("a", 100, vec!["rust"]),
            ("b", 300, vec!["rust", "web"]),
            ("c", 200, vec!["web"]),
        ] {
            store
                .set("threads", id, json!({"last_activity": ts, "tags": tags}))
                .await
                .unwrap();
        }

        let mut q = Query::new("threads");
        q.order_by = vec![OrderBy::desc("last_activity"), OrderBy::doc_id_desc()];
        let docs = store.query(q.clone()).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);

        q.array_contains = Some(("tags".to_string(), json!("web")));
        let docs = store.query(q.clone()).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);

        q.array_contains = None;
        q.start_after = Some(vec![json!(300), json!("b")]);
        let docs = store.query(q).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[tokio::test]
    async fn query_breaks_timestamp_ties_by_doc_id() {
        let store = MemoryStore::new();
        for id in ["x1", "x2", "x3"] {
            store
                .set("threads", id, json!({"last_activity": 500}))
                .await
                .unwrap();
        }
        let mut q = Query::new("threads");
        q.order_by = vec![OrderBy::desc("last_activity"), OrderBy::doc_id_desc()];
        q.limit = 2;
        let first = store.query(q.clone()).await.unwrap();
        let last = first.last().unwrap();
        q.start_after = Some(vec![last.data["last_activity"].clone(), json!(last.id)]);
        q.limit = usize::MAX;
        let rest = store.query(q).await.unwrap();

        let mut seen: Vec<String> = first.into_iter().chain(rest).map(|d| d.id).collect();
        seen.sort();
        assert_eq!(seen, ["x1", "x2", "x3"]);
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = MemoryStore::new();
        store
            .set("threads", "t1", json!({"comment_count": 0}))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.update("threads", "t1", json!({"comment_count": 1}));
        tx.set("threads/t1/comments", "c1", json!({"body": "hi"}));

        let thread = tx.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(thread.data["comment_count"], 1);
        let comment = tx.get("threads/t1/comments", "c1").await.unwrap().unwrap();
        assert_eq!(comment.data["body"], "hi");

        // Nothing visible outside before commit.
        assert!(store
            .get("threads/t1/comments", "c1")
            .await
            .unwrap()
            .is_none());
        tx.commit().await.unwrap();
        assert!(store
            .get("threads/t1/comments", "c1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn conflicting_commit_aborts_second_transaction() {
        let store = MemoryStore::new();
        store
            .set("threads", "t1", json!({"comment_count": 0}))
            .await
            .unwrap();

        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        let c1 = tx1.get("threads", "t1").await.unwrap().unwrap();
        let c2 = tx2.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(c1.data["comment_count"], c2.data["comment_count"]);

        tx1.update("threads", "t1", json!({"comment_count": 1}));
        tx1.commit().await.unwrap();

        tx2.update("threads", "t1", json!({"comment_count": 1}));
        let err = tx2.commit().await.unwrap_err();
        assert!(matches!(err, AppError::TxnConflict));

        // The losing transaction left no partial state behind.
        let doc = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(doc.data["comment_count"], 1);
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_store_unmodified() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.set("threads", "ghost", json!({"title": "never"}));
            // dropped without commit
        }
        assert!(store.get("threads", "ghost").await.unwrap().is_none());
    }
}
