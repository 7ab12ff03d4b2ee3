//! In-memory document database with filtered queries and change notification.
//!
//! Collections hold schemaless JSON documents keyed by generated identifiers.
//! Every mutation is broadcast so live queries can re-run and push a fresh
//! snapshot to their listeners.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::errors::{MoneyError, Result};

/// Field map of one stored document.
pub type Fields = Map<String, Value>;

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

const CHANGE_CHANNEL_CAPACITY: usize = 256;
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    pub document_id: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Missing fields compare as `null`, so `parentId == null` also matches
    /// documents that never stored the field.
    fn matches(&self, fields: &Fields) -> bool {
        let actual = fields.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Gte => {
                comparable(actual, &self.value) && compare_values(actual, &self.value).is_ge()
            }
            FilterOp::Lte => {
                comparable(actual, &self.value) && compare_values(actual, &self.value).is_le()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality/range filters over one collection, with optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    fn with_filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_filter(field, FilterOp::Eq, value.into())
    }

    pub fn where_gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_filter(field, FilterOp::Gte, value.into())
    }

    pub fn where_lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_filter(field, FilterOp::Lte, value.into())
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|filter| filter.matches(fields))
    }
}

/// Serializable image of every collection, used by the JSON backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    pub collections: Collections,
}

struct StoreInner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<ChangeEvent>,
}

/// Cheaply cloneable handle; clones share the same data.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_collections(Collections::new())
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self::with_collections(snapshot.collections)
    }

    fn with_collections(collections: Collections) -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                collections: RwLock::new(collections),
                changes,
            }),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            collections: self.read()?.clone(),
        })
    }

    /// Stores a new document under a generated identifier and returns it.
    pub fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        self.publish(collection, &id, ChangeKind::Added);
        Ok(id)
    }

    /// Replaces the whole document, creating it when absent.
    pub fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let previous = self
            .write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        let kind = if previous.is_some() {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.publish(collection, id, kind);
        Ok(())
    }

    /// Removes a document. Deleting a missing document is not an error.
    pub fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self
            .write()?
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            self.publish(collection, id, ChangeKind::Removed);
        }
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    pub fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let guard = self.read()?;
        let Some(docs) = guard.get(&query.collection) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| query.matches(fields))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        drop(guard);

        if let Some((field, direction)) = &query.order_by {
            matched.sort_by(|a, b| {
                let left = a.fields.get(field).unwrap_or(&Value::Null);
                let right = b.fields.get(field).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    /// Change feed for every collection.
    pub fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes.subscribe()
    }

    /// Live query: yields the current matching set, then a fresh set after
    /// every change to the queried collection. Ends when dropped.
    pub fn watch(&self, query: Query) -> BoxStream<'static, Result<Vec<Document>>> {
        let state = WatchState {
            store: self.clone(),
            receiver: self.changes(),
            query,
            primed: false,
        };
        stream::unfold(state, |mut state| async move {
            if state.primed {
                loop {
                    match state.receiver.recv().await {
                        Ok(event) if event.collection == state.query.collection => break,
                        Ok(_) => continue,
                        // missed events; re-querying catches up
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
            state.primed = true;
            let snapshot = state.store.query(&state.query);
            Some((snapshot, state))
        })
        .boxed()
    }

    fn publish(&self, collection: &str, id: &str, kind: ChangeKind) {
        tracing::trace!(collection, id, ?kind, "document changed");
        // no listeners is fine
        let _ = self.inner.changes.send(ChangeEvent {
            collection: collection.to_string(),
            document_id: id.to_string(),
            kind,
        });
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.inner
            .collections
            .read()
            .map_err(|_| MoneyError::Storage("document store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .collections
            .write()
            .map_err(|_| MoneyError::Storage("document store lock poisoned".into()))
    }
}

struct WatchState {
    store: DocumentStore,
    receiver: broadcast::Receiver<ChangeEvent>,
    query: Query,
    primed: bool,
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
    )
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixtures are objects"),
        }
    }

    #[test]
    fn query_filters_orders_and_limits() {
        let store = DocumentStore::new();
        for (user, date) in [("a", 3), ("a", 1), ("b", 2), ("a", 2)] {
            store
                .add("transactions", fields(json!({ "userId": user, "date": date })))
                .unwrap();
        }
        let query = Query::collection("transactions")
            .where_eq("userId", "a")
            .order_by("date", Direction::Descending)
            .limit(2);
        let docs = store.query(&query).unwrap();
        let dates: Vec<i64> = docs.iter().map(|d| d.fields["date"].as_i64().unwrap()).collect();
        assert_eq!(dates, vec![3, 2]);
    }

    #[test]
    fn missing_field_matches_null_equality() {
        let store = DocumentStore::new();
        store.add("categories", fields(json!({ "name": "Food" }))).unwrap();
        store
            .add("categories", fields(json!({ "name": "Snacks", "parentId": "x" })))
            .unwrap();
        let top = store
            .query(&Query::collection("categories").where_eq("parentId", Value::Null))
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].fields["name"], "Food");
    }

    #[test]
    fn range_filters_are_inclusive_and_type_strict() {
        let store = DocumentStore::new();
        store.add("budgets", fields(json!({ "start": 10, "end": 20 }))).unwrap();
        store.add("budgets", fields(json!({ "start": "10" }))).unwrap();
        let hits = store
            .query(
                &Query::collection("budgets")
                    .where_lte("start", 10)
                    .where_gte("end", 20),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn set_replaces_and_delete_is_idempotent() {
        let store = DocumentStore::new();
        let id = store.add("c", fields(json!({ "a": 1, "b": 2 }))).unwrap();
        store.set("c", &id, fields(json!({ "a": 5 }))).unwrap();
        let doc = store.get("c", &id).unwrap().unwrap();
        assert_eq!(doc.fields.get("b"), None);
        store.delete("c", &id).unwrap();
        store.delete("c", &id).unwrap();
        assert!(store.get("c", &id).unwrap().is_none());
    }

    #[tokio::test]
    async fn watch_emits_initial_and_updated_snapshots() {
        let store = DocumentStore::new();
        store.add("t", fields(json!({ "n": 1 }))).unwrap();
        let mut live = store.watch(Query::collection("t"));

        let first = live.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store.add("other", fields(json!({}))).unwrap();
        store.add("t", fields(json!({ "n": 2 }))).unwrap();
        let second = live.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn snapshot_round_trip_keeps_documents() {
        let store = DocumentStore::new();
        let id = store.add("t", fields(json!({ "n": 1 }))).unwrap();
        let restored = DocumentStore::from_snapshot(store.snapshot().unwrap());
        assert!(restored.get("t", &id).unwrap().is_some());
    }
}
