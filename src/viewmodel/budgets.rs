use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use super::state::{apply, spawn_fold, ActionResult, ActiveListener, LoadEvent, LoadState};
use crate::{
    config::Config,
    core::{
        services::{BudgetOverview, BudgetService},
        Clock,
    },
    domain::{Budget, BudgetDraft},
    notifications::Notifier,
    storage::BudgetRepository,
};

/// Budgets active today plus their roll-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetsView {
    pub budgets: Vec<Budget>,
    pub overview: BudgetOverview,
}

pub struct BudgetViewModel {
    repository: Arc<dyn BudgetRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    alert_threshold: f64,
    state: Arc<watch::Sender<LoadState<BudgetsView>>>,
    listener: ActiveListener,
}

impl BudgetViewModel {
    pub fn new(
        repository: Arc<dyn BudgetRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            repository,
            notifier,
            clock,
            alert_threshold: config.budget_alert_threshold,
            state: Arc::new(watch::channel(LoadState::Loading).0),
            listener: ActiveListener::default(),
        }
    }

    pub fn state(&self) -> watch::Receiver<LoadState<BudgetsView>> {
        self.state.subscribe()
    }

    /// Subscribes to the budgets covering the current instant. Each snapshot
    /// recomputes the overview and raises alerts for budgets past the threshold.
    pub fn load(&self) {
        let epoch = self.listener.begin();
        apply(&self.state, LoadEvent::Started);
        let subscription = match self.repository.for_date(self.clock.now()) {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(error = %err, "could not load budgets");
                apply(&self.state, LoadEvent::Failed(err.user_message()));
                return;
            }
        };
        let notifier = Arc::clone(&self.notifier);
        let threshold = self.alert_threshold;
        let handle = spawn_fold(subscription, Arc::clone(&self.state), epoch, move |budgets| {
            for alert in BudgetService::alerts(&budgets, threshold) {
                info!(
                    budget = %alert.budget_name,
                    percent = alert.percent,
                    "budget threshold reached"
                );
                notifier.notify_budget_alert(&alert);
            }
            BudgetsView {
                overview: BudgetService::overview(&budgets),
                budgets,
            }
        });
        self.listener.attach(handle);
    }

    /// Validates the dialog input, then creates or updates the budget.
    pub async fn submit(&self, draft: &BudgetDraft) -> ActionResult<Budget> {
        let budget = draft.validate().map_err(|err| err.to_string())?;
        if budget.id.is_empty() {
            self.save(budget).await
        } else {
            self.update(budget.clone()).await?;
            Ok(budget)
        }
    }

    pub async fn save(&self, budget: Budget) -> ActionResult<Budget> {
        let stored = self
            .repository
            .save(budget)
            .await
            .map_err(|err| err.user_message())?;
        debug!(id = %stored.id, "budget saved");
        Ok(stored)
    }

    pub async fn update(&self, budget: Budget) -> ActionResult {
        self.repository
            .update(budget)
            .await
            .map_err(|err| err.user_message())
    }

    pub async fn delete(&self, id: &str) -> ActionResult {
        self.repository
            .delete(id)
            .await
            .map_err(|err| err.user_message())
    }
}
