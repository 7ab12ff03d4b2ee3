use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::watch;
use tracing::{debug, error};

use super::state::{apply, spawn_fold, ActionResult, ActiveListener, LoadEvent, LoadState};
use crate::{
    domain::{Transaction, TransactionDraft, TransactionKind},
    errors::Result,
    storage::{Subscription, TransactionRepository},
};

/// Which live query feeds the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionFilter {
    #[default]
    All,
    ByType(TransactionKind),
    ByMonth { month: u32, year: i32 },
    ByTypeAndMonth {
        kind: TransactionKind,
        month: u32,
        year: i32,
    },
    Recent(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub active: bool,
    pub selected: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchDeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Drives the transaction list, detail and multi-select screens.
///
/// Loads spawn onto the ambient tokio runtime; call them from inside one.
pub struct TransactionsViewModel {
    repository: Arc<dyn TransactionRepository>,
    state: Arc<watch::Sender<LoadState<Vec<Transaction>>>>,
    current: watch::Sender<Option<Transaction>>,
    selection: watch::Sender<SelectionState>,
    filter: Mutex<TransactionFilter>,
    listener: ActiveListener,
}

impl TransactionsViewModel {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self {
            repository,
            state: Arc::new(watch::channel(LoadState::Loading).0),
            current: watch::channel(None).0,
            selection: watch::channel(SelectionState::default()).0,
            filter: Mutex::new(TransactionFilter::All),
            listener: ActiveListener::default(),
        }
    }

    pub fn state(&self) -> watch::Receiver<LoadState<Vec<Transaction>>> {
        self.state.subscribe()
    }

    pub fn current_transaction(&self) -> watch::Receiver<Option<Transaction>> {
        self.current.subscribe()
    }

    pub fn selection(&self) -> watch::Receiver<SelectionState> {
        self.selection.subscribe()
    }

    pub fn load_all(&self) {
        self.load(TransactionFilter::All);
    }

    pub fn load_by_type(&self, kind: TransactionKind) {
        self.load(TransactionFilter::ByType(kind));
    }

    pub fn load_by_month(&self, month: u32, year: i32) {
        self.load(TransactionFilter::ByMonth { month, year });
    }

    pub fn load_by_type_and_month(&self, kind: TransactionKind, month: u32, year: i32) {
        self.load(TransactionFilter::ByTypeAndMonth { kind, month, year });
    }

    pub fn load_recent(&self, limit: usize) {
        self.load(TransactionFilter::Recent(limit));
    }

    /// Re-runs the most recent load.
    pub fn reload(&self) {
        let filter = *self.filter_slot();
        self.load(filter);
    }

    /// Starts `filter`, cancelling whatever query fed the list before.
    pub fn load(&self, filter: TransactionFilter) {
        let epoch = self.listener.begin();
        *self.filter_slot() = filter;
        apply(&self.state, LoadEvent::Started);
        match self.open(filter) {
            Ok(subscription) => {
                let handle = spawn_fold(subscription, self.state.clone(), epoch, |items| items);
                self.listener.attach(handle);
            }
            Err(err) => {
                error!(?filter, error = %err, "could not load transactions");
                apply(&self.state, LoadEvent::Failed(err.user_message()));
            }
        }
    }

    fn open(&self, filter: TransactionFilter) -> Result<Subscription<Transaction>> {
        match filter {
            TransactionFilter::All => self.repository.all(),
            TransactionFilter::ByType(kind) => self.repository.by_type(kind),
            TransactionFilter::ByMonth { month, year } => self.repository.by_month(month, year),
            TransactionFilter::ByTypeAndMonth { kind, month, year } => {
                self.repository.by_type_and_month(kind, month, year)
            }
            TransactionFilter::Recent(limit) => self.repository.recent(limit),
        }
    }

    pub async fn load_transaction(&self, id: &str) -> ActionResult<Transaction> {
        match self.repository.get(id).await {
            Ok(transaction) => {
                self.current.send_replace(Some(transaction.clone()));
                Ok(transaction)
            }
            Err(err) => Err(err.user_message()),
        }
    }

    pub async fn add(&self, transaction: Transaction) -> ActionResult<Transaction> {
        apply(&self.state, LoadEvent::Started);
        match self.repository.add(transaction).await {
            Ok(stored) => {
                debug!(id = %stored.id, "transaction added");
                self.reload();
                Ok(stored)
            }
            Err(err) => {
                let message = err.user_message();
                apply(&self.state, LoadEvent::Failed(message.clone()));
                Err(message)
            }
        }
    }

    pub async fn update(&self, transaction: Transaction) -> ActionResult {
        self.repository
            .update(transaction)
            .await
            .map_err(|err| err.user_message())?;
        self.reload();
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ActionResult {
        self.repository
            .delete(id)
            .await
            .map_err(|err| err.user_message())?;
        self.reload();
        Ok(())
    }

    /// Validates the form, then adds or updates depending on whether it carries an id.
    pub async fn submit(&self, draft: &TransactionDraft) -> ActionResult<Transaction> {
        let transaction = draft.validate().map_err(|err| err.to_string())?;
        if transaction.id.is_empty() {
            self.add(transaction).await
        } else {
            self.update(transaction.clone()).await?;
            Ok(transaction)
        }
    }

    pub fn toggle_selection_mode(&self) {
        self.selection.send_modify(|selection| {
            selection.active = !selection.active;
            if !selection.active {
                selection.selected.clear();
            }
        });
    }

    pub fn toggle_selection(&self, id: &str) {
        self.selection.send_modify(|selection| {
            if !selection.selected.remove(id) {
                selection.selected.insert(id.to_string());
            }
        });
    }

    /// Selects every transaction currently listed.
    pub fn select_all(&self) {
        let ids: BTreeSet<String> = match &*self.state.borrow() {
            LoadState::Success(items) => items.iter().map(|t| t.id.clone()).collect(),
            _ => BTreeSet::new(),
        };
        self.selection
            .send_modify(|selection| selection.selected = ids);
    }

    pub fn clear_selection(&self) {
        self.selection
            .send_modify(|selection| selection.selected.clear());
    }

    /// Deletes the selection one id at a time; a failure does not stop the rest.
    /// Selection mode is left afterwards either way.
    pub async fn delete_selected(&self) -> BatchDeleteReport {
        let ids: Vec<String> = self.selection.borrow().selected.iter().cloned().collect();
        let mut report = BatchDeleteReport::default();
        for id in &ids {
            match self.repository.delete(id).await {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    debug!(%id, error = %err, "batch delete item failed");
                    report.failed += 1;
                }
            }
        }
        self.selection.send_replace(SelectionState::default());
        if report.failed > 0 {
            error!(failed = report.failed, "Failed to delete {} transactions", report.failed);
        }
        report
    }

    fn filter_slot(&self) -> MutexGuard<'_, TransactionFilter> {
        self.filter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
