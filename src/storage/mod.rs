pub mod document_store;
pub mod json_backend;
pub mod repositories;

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::{
    domain::{Budget, Category, Transaction, TransactionKind},
    errors::Result,
};

pub use document_store::{
    ChangeEvent, ChangeKind, Direction, Document, DocumentStore, Fields, Filter, FilterOp, Query,
    StoreSnapshot,
};
pub use json_backend::{JsonDocumentStorage, SnapshotBackend};
pub use repositories::{
    DocumentBudgetRepository, DocumentCategoryRepository, DocumentTransactionRepository,
    BUDGETS_COLLECTION, CATEGORIES_COLLECTION, TRANSACTIONS_COLLECTION,
};

/// Live query handle yielding the full matching set on every change.
///
/// The first item is the current result. Cancelling or dropping the handle
/// detaches it from the store.
pub struct Subscription<T> {
    inner: Option<BoxStream<'static, Result<Vec<T>>>>,
}

impl<T: Send + 'static> Subscription<T> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Vec<T>>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// A subscription that yields one snapshot and ends.
    pub fn once(items: Vec<T>) -> Self {
        Self::new(futures::stream::once(async move { Ok(items) }))
    }

    /// Next snapshot, or `None` once cancelled or the source is gone.
    pub async fn next(&mut self) -> Option<Result<Vec<T>>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }
}

impl<T> Subscription<T> {
    pub fn cancel(&mut self) {
        self.inner = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<Vec<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().inner.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Transaction persistence scoped to the signed-in user.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    fn all(&self) -> Result<Subscription<Transaction>>;
    fn by_type(&self, kind: TransactionKind) -> Result<Subscription<Transaction>>;
    fn by_month(&self, month: u32, year: i32) -> Result<Subscription<Transaction>>;
    fn by_type_and_month(
        &self,
        kind: TransactionKind,
        month: u32,
        year: i32,
    ) -> Result<Subscription<Transaction>>;
    /// Newest first.
    fn recent(&self, limit: usize) -> Result<Subscription<Transaction>>;

    async fn get(&self, id: &str) -> Result<Transaction>;
    /// Stores a new record and returns it with its generated id.
    async fn add(&self, transaction: Transaction) -> Result<Transaction>;
    /// Replaces the whole record.
    async fn update(&self, transaction: Transaction) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    fn all(&self) -> Result<Subscription<Category>>;
    fn by_type(&self, kind: TransactionKind) -> Result<Subscription<Category>>;
    fn top_level(&self) -> Result<Subscription<Category>>;
    fn top_level_by_type(&self, kind: TransactionKind) -> Result<Subscription<Category>>;
    fn subcategories(&self, parent_id: &str) -> Result<Subscription<Category>>;

    async fn get(&self, id: &str) -> Result<Category>;
    async fn add(&self, category: Category) -> Result<Category>;
    /// Removes the category after its subcategories. Not atomic.
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    /// Budgets whose coverage period contains `date`, bounds inclusive.
    fn for_date(&self, date: DateTime<Utc>) -> Result<Subscription<Budget>>;

    async fn get(&self, id: &str) -> Result<Budget>;
    async fn save(&self, budget: Budget) -> Result<Budget>;
    async fn update(&self, budget: Budget) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}
