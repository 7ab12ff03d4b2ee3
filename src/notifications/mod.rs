//! Delivery of budget threshold alerts.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::core::services::BudgetAlert;

pub trait Notifier: Send + Sync {
    /// Posts or replaces the notification keyed by `alert.budget_id`.
    fn notify_budget_alert(&self, alert: &BudgetAlert);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub key: String,
    pub title: String,
    pub body: String,
}

impl From<&BudgetAlert> for Notification {
    fn from(alert: &BudgetAlert) -> Self {
        Self {
            key: alert.budget_id.clone(),
            title: alert.title(),
            body: alert.body(),
        }
    }
}

/// Notification tray kept in memory; one slot per budget.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    posted: Mutex<BTreeMap<String, Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Vec<Notification> {
        self.lock().values().cloned().collect()
    }

    pub fn get(&self, budget_id: &str) -> Option<Notification> {
        self.lock().get(budget_id).cloned()
    }

    pub fn dismiss(&self, budget_id: &str) -> bool {
        self.lock().remove(budget_id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Notification>> {
        self.posted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for InMemoryNotifier {
    fn notify_budget_alert(&self, alert: &BudgetAlert) {
        let notification = Notification::from(alert);
        self.lock().insert(notification.key.clone(), notification);
    }
}

/// Writes alerts to the log instead of a tray.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_budget_alert(&self, alert: &BudgetAlert) {
        tracing::info!(
            budget_id = %alert.budget_id,
            percent = alert.percent,
            "{}",
            alert.body()
        );
    }
}
