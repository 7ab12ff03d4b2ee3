//! Repository adapters over [`DocumentStore`], scoped by the `userId` field.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    document_store::{Direction, Document, DocumentStore, Fields, Query},
    BudgetRepository, CategoryRepository, Subscription, TransactionRepository,
};
use crate::{
    auth::AuthProvider,
    core::services::CategoryService,
    domain::{
        check_amount, Budget, Category, Identifiable, Transaction, TransactionKind, UserOwned,
    },
    errors::{MoneyError, Result},
};

pub const TRANSACTIONS_COLLECTION: &str = "transactions";
pub const CATEGORIES_COLLECTION: &str = "categories";
pub const BUDGETS_COLLECTION: &str = "budgets";

const ID_FIELD: &str = "id";
const USER_ID_FIELD: &str = "userId";
const TYPE_FIELD: &str = "type";
const MONTH_FIELD: &str = "month";
const YEAR_FIELD: &str = "year";
const DATE_FIELD: &str = "date";
const PARENT_ID_FIELD: &str = "parentId";
const START_DATE_FIELD: &str = "startDate";
const END_DATE_FIELD: &str = "endDate";

/// Store handle plus the identity used to scope every read and write.
#[derive(Clone)]
struct UserScope {
    store: DocumentStore,
    auth: Arc<dyn AuthProvider>,
}

impl UserScope {
    fn user_id(&self) -> Result<String> {
        self.auth.current_user_id()
    }

    fn query(&self, collection: &str) -> Result<Query> {
        Ok(Query::collection(collection).where_eq(USER_ID_FIELD, self.user_id()?))
    }

    fn live<T>(&self, query: Query) -> Subscription<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let collection = query.collection.clone();
        Subscription::new(
            self.store
                .watch(query)
                .map(move |snapshot| snapshot.map(|docs| decode_all(&collection, docs))),
        )
    }

    /// Loads a document and checks it belongs to `uid`.
    fn owned(&self, collection: &str, id: &str, uid: &str) -> Result<Document> {
        match self.store.get(collection, id)? {
            Some(doc) if doc.fields.get(USER_ID_FIELD).and_then(Value::as_str) == Some(uid) => {
                Ok(doc)
            }
            Some(_) => Err(MoneyError::Repository(
                "Missing or insufficient permissions".into(),
            )),
            None => Err(MoneyError::NotFound(format!("{collection}/{id} not found"))),
        }
    }

    fn fetch<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<T> {
        let uid = self.user_id()?;
        let doc = self.owned(collection, id, &uid)?;
        decode(collection, doc)
            .ok_or_else(|| MoneyError::Repository(format!("{collection}/{id} is malformed")))
    }

    fn insert<T>(&self, collection: &str, mut record: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + UserOwned,
    {
        record.set_user_id(self.user_id()?);
        let fields = encode(&record)?;
        let mut stored: Fields = fields.clone();
        stored.insert(ID_FIELD.into(), Value::String(String::new()));
        readable::<T>(collection, &stored)?;
        let id = self.store.add(collection, fields)?;
        debug!(collection, %id, "document added");
        stored.insert(ID_FIELD.into(), Value::String(id));
        Ok(serde_json::from_value(Value::Object(stored))?)
    }

    fn replace<T>(&self, collection: &str, mut record: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned + UserOwned + Identifiable,
    {
        let uid = self.user_id()?;
        let id = record.id().to_string();
        self.owned(collection, &id, &uid)?;
        record.set_user_id(uid);
        let fields = encode(&record)?;
        let mut check = fields.clone();
        check.insert(ID_FIELD.into(), Value::String(id.clone()));
        readable::<T>(collection, &check)?;
        self.store.set(collection, &id, fields)?;
        debug!(collection, %id, "document replaced");
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let uid = self.user_id()?;
        self.owned(collection, id, &uid)?;
        self.store.delete(collection, id)?;
        debug!(collection, id, "document deleted");
        Ok(())
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(mut fields) => {
            fields.remove(ID_FIELD);
            Ok(fields)
        }
        _ => Err(MoneyError::Storage("record must serialize to an object".into())),
    }
}

/// Rejects fields that would be written but never read back, such as a
/// non-finite number serialized as `null`.
fn readable<T: DeserializeOwned>(collection: &str, fields: &Fields) -> Result<()> {
    serde_json::from_value::<T>(Value::Object(fields.clone()))
        .map(|_| ())
        .map_err(|err| {
            MoneyError::Repository(format!("{collection} record is malformed: {err}"))
        })
}

fn decode<T: DeserializeOwned>(collection: &str, doc: Document) -> Option<T> {
    let Document { id, mut fields } = doc;
    fields.insert(ID_FIELD.into(), Value::String(id.clone()));
    match serde_json::from_value(Value::Object(fields)) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(collection, %id, error = %err, "skipping undecodable document");
            None
        }
    }
}

fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| decode(collection, doc))
        .collect()
}

#[derive(Clone)]
pub struct DocumentTransactionRepository {
    scope: UserScope,
}

impl DocumentTransactionRepository {
    pub fn new(store: DocumentStore, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            scope: UserScope { store, auth },
        }
    }

    fn base(&self) -> Result<Query> {
        self.scope.query(TRANSACTIONS_COLLECTION)
    }
}

#[async_trait]
impl TransactionRepository for DocumentTransactionRepository {
    fn all(&self) -> Result<Subscription<Transaction>> {
        Ok(self.scope.live(self.base()?))
    }

    fn by_type(&self, kind: TransactionKind) -> Result<Subscription<Transaction>> {
        Ok(self.scope.live(self.base()?.where_eq(TYPE_FIELD, kind.as_str())))
    }

    fn by_month(&self, month: u32, year: i32) -> Result<Subscription<Transaction>> {
        let query = self
            .base()?
            .where_eq(MONTH_FIELD, month)
            .where_eq(YEAR_FIELD, year);
        Ok(self.scope.live(query))
    }

    fn by_type_and_month(
        &self,
        kind: TransactionKind,
        month: u32,
        year: i32,
    ) -> Result<Subscription<Transaction>> {
        let query = self
            .base()?
            .where_eq(TYPE_FIELD, kind.as_str())
            .where_eq(MONTH_FIELD, month)
            .where_eq(YEAR_FIELD, year);
        Ok(self.scope.live(query))
    }

    fn recent(&self, limit: usize) -> Result<Subscription<Transaction>> {
        let query = self
            .base()?
            .order_by(DATE_FIELD, Direction::Descending)
            .limit(limit);
        Ok(self.scope.live(query))
    }

    async fn get(&self, id: &str) -> Result<Transaction> {
        self.scope.fetch(TRANSACTIONS_COLLECTION, id)
    }

    async fn add(&self, transaction: Transaction) -> Result<Transaction> {
        check_amount(transaction.amount)?;
        self.scope.insert(TRANSACTIONS_COLLECTION, transaction)
    }

    async fn update(&self, transaction: Transaction) -> Result<()> {
        check_amount(transaction.amount)?;
        self.scope.replace(TRANSACTIONS_COLLECTION, transaction)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.scope.remove(TRANSACTIONS_COLLECTION, id)
    }
}

#[derive(Clone)]
pub struct DocumentCategoryRepository {
    scope: UserScope,
}

impl DocumentCategoryRepository {
    pub fn new(store: DocumentStore, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            scope: UserScope { store, auth },
        }
    }

    fn base(&self) -> Result<Query> {
        self.scope.query(CATEGORIES_COLLECTION)
    }
}

#[async_trait]
impl CategoryRepository for DocumentCategoryRepository {
    fn all(&self) -> Result<Subscription<Category>> {
        Ok(self.scope.live(self.base()?))
    }

    fn by_type(&self, kind: TransactionKind) -> Result<Subscription<Category>> {
        Ok(self.scope.live(self.base()?.where_eq(TYPE_FIELD, kind.as_str())))
    }

    fn top_level(&self) -> Result<Subscription<Category>> {
        Ok(self.scope.live(self.base()?.where_eq(PARENT_ID_FIELD, Value::Null)))
    }

    fn top_level_by_type(&self, kind: TransactionKind) -> Result<Subscription<Category>> {
        let query = self
            .base()?
            .where_eq(TYPE_FIELD, kind.as_str())
            .where_eq(PARENT_ID_FIELD, Value::Null);
        Ok(self.scope.live(query))
    }

    fn subcategories(&self, parent_id: &str) -> Result<Subscription<Category>> {
        Ok(self.scope.live(self.base()?.where_eq(PARENT_ID_FIELD, parent_id)))
    }

    async fn get(&self, id: &str) -> Result<Category> {
        self.scope.fetch(CATEGORIES_COLLECTION, id)
    }

    async fn add(&self, category: Category) -> Result<Category> {
        let parent = match category.parent_id.as_deref() {
            Some(parent_id) => Some(
                self.scope
                    .fetch::<Category>(CATEGORIES_COLLECTION, parent_id)?,
            ),
            None => None,
        };
        CategoryService::validate(&category, parent.as_ref())?;
        self.scope.insert(CATEGORIES_COLLECTION, category)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let uid = self.scope.user_id()?;
        self.scope.owned(CATEGORIES_COLLECTION, id, &uid)?;
        let children = self
            .scope
            .store
            .query(&self.base()?.where_eq(PARENT_ID_FIELD, id))?;
        for child in &children {
            self.scope.store.delete(CATEGORIES_COLLECTION, &child.id)?;
        }
        self.scope.store.delete(CATEGORIES_COLLECTION, id)?;
        debug!(id, subcategories = children.len(), "category deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct DocumentBudgetRepository {
    scope: UserScope,
}

impl DocumentBudgetRepository {
    pub fn new(store: DocumentStore, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            scope: UserScope { store, auth },
        }
    }
}

#[async_trait]
impl BudgetRepository for DocumentBudgetRepository {
    fn for_date(&self, date: DateTime<Utc>) -> Result<Subscription<Budget>> {
        let millis = date.timestamp_millis();
        let query = self
            .scope
            .query(BUDGETS_COLLECTION)?
            .where_gte(END_DATE_FIELD, millis)
            .where_lte(START_DATE_FIELD, millis);
        Ok(self.scope.live(query))
    }

    async fn get(&self, id: &str) -> Result<Budget> {
        self.scope.fetch(BUDGETS_COLLECTION, id)
    }

    async fn save(&self, budget: Budget) -> Result<Budget> {
        self.scope.insert(BUDGETS_COLLECTION, budget)
    }

    async fn update(&self, budget: Budget) -> Result<()> {
        self.scope.replace(BUDGETS_COLLECTION, budget)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.scope.remove(BUDGETS_COLLECTION, id)
    }
}
