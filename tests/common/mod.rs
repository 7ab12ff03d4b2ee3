#![allow(dead_code)]

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use money_manager_core::{
    auth::InMemoryAuth,
    domain::{Transaction, TransactionKind},
    storage::{
        DocumentBudgetRepository, DocumentCategoryRepository, DocumentStore,
        DocumentTransactionRepository, Subscription, TransactionRepository,
    },
    viewmodel::LoadState,
    MoneyError, Result,
};
use tokio::sync::watch;

pub const USER: &str = "user-1";

/// Repositories for one signed-in user over a fresh store.
pub struct Fixture {
    pub store: DocumentStore,
    pub auth: Arc<InMemoryAuth>,
    pub transactions: Arc<DocumentTransactionRepository>,
    pub categories: Arc<DocumentCategoryRepository>,
    pub budgets: Arc<DocumentBudgetRepository>,
}

pub fn fixture() -> Fixture {
    fixture_with_store(DocumentStore::new())
}

pub fn fixture_with_store(store: DocumentStore) -> Fixture {
    let auth = Arc::new(InMemoryAuth::signed_in(USER));
    Fixture {
        transactions: Arc::new(DocumentTransactionRepository::new(store.clone(), auth.clone())),
        categories: Arc::new(DocumentCategoryRepository::new(store.clone(), auth.clone())),
        budgets: Arc::new(DocumentBudgetRepository::new(store.clone(), auth.clone())),
        store,
        auth,
    }
}

pub fn march_2024(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn expense(amount: f64, category: &str, date: DateTime<Utc>) -> Transaction {
    Transaction::new(amount, TransactionKind::Expense, category, date)
}

pub fn income(amount: f64, category: &str, date: DateTime<Utc>) -> Transaction {
    Transaction::new(amount, TransactionKind::Income, category, date)
}

/// Waits until the state satisfies `ready`, failing after two seconds.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<LoadState<T>>,
    ready: impl Fn(&LoadState<T>) -> bool,
) -> LoadState<T> {
    let deadline = tokio::time::sleep(Duration::from_secs(2));
    tokio::pin!(deadline);
    loop {
        {
            let current = rx.borrow_and_update();
            if ready(&*current) {
                return current.clone();
            }
        }
        tokio::select! {
            changed = rx.changed() => changed.expect("state sender dropped"),
            _ = &mut deadline => panic!("timed out waiting for state"),
        }
    }
}

pub async fn wait_for_success<T: Clone>(rx: &mut watch::Receiver<LoadState<T>>) -> T {
    match wait_for(rx, |state| !state.is_loading()).await {
        LoadState::Success(value) => value,
        other => panic!("expected success, got error {:?}", other.error()),
    }
}

/// Delegates to a real repository but fails deletes for chosen ids.
pub struct FlakyTransactions {
    pub inner: Arc<dyn TransactionRepository>,
    pub failing_deletes: HashSet<String>,
}

#[async_trait]
impl TransactionRepository for FlakyTransactions {
    fn all(&self) -> Result<Subscription<Transaction>> {
        self.inner.all()
    }

    fn by_type(&self, kind: TransactionKind) -> Result<Subscription<Transaction>> {
        self.inner.by_type(kind)
    }

    fn by_month(&self, month: u32, year: i32) -> Result<Subscription<Transaction>> {
        self.inner.by_month(month, year)
    }

    fn by_type_and_month(
        &self,
        kind: TransactionKind,
        month: u32,
        year: i32,
    ) -> Result<Subscription<Transaction>> {
        self.inner.by_type_and_month(kind, month, year)
    }

    fn recent(&self, limit: usize) -> Result<Subscription<Transaction>> {
        self.inner.recent(limit)
    }

    async fn get(&self, id: &str) -> Result<Transaction> {
        self.inner.get(id).await
    }

    async fn add(&self, transaction: Transaction) -> Result<Transaction> {
        self.inner.add(transaction).await
    }

    async fn update(&self, transaction: Transaction) -> Result<()> {
        self.inner.update(transaction).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.failing_deletes.contains(id) {
            return Err(MoneyError::Repository("network unavailable".into()));
        }
        self.inner.delete(id).await
    }
}
