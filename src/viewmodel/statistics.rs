use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};
use tokio::sync::watch;

use super::state::LoadState;
use crate::{
    config::Config,
    core::{
        services::{Period, StatisticsReport, StatisticsService},
        Clock,
    },
    domain::{Category, Transaction, TransactionKind},
};

/// Period/type selection for the statistics screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSelection {
    pub period: Period,
    pub kind: TransactionKind,
}

impl Default for StatisticsSelection {
    fn default() -> Self {
        Self {
            period: Period::Month,
            kind: TransactionKind::Expense,
        }
    }
}

pub struct StatisticsViewModel {
    clock: Arc<dyn Clock>,
    first_day_of_week: Weekday,
    selection: watch::Sender<StatisticsSelection>,
}

impl StatisticsViewModel {
    pub fn new(clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            clock,
            first_day_of_week: config.first_day_of_week,
            selection: watch::channel(StatisticsSelection::default()).0,
        }
    }

    pub fn selection(&self) -> watch::Receiver<StatisticsSelection> {
        self.selection.subscribe()
    }

    pub fn select_period(&self, period: Period) {
        self.selection.send_modify(|selection| selection.period = period);
    }

    pub fn select_kind(&self, kind: TransactionKind) {
        self.selection.send_modify(|selection| selection.kind = kind);
    }

    /// Report for the current selection as of now.
    pub fn report(
        &self,
        transactions: &LoadState<Vec<Transaction>>,
        categories: &LoadState<Vec<Category>>,
    ) -> LoadState<StatisticsReport> {
        let selection = *self.selection.borrow();
        combine(
            transactions,
            categories,
            selection,
            self.clock.now(),
            self.first_day_of_week,
        )
    }
}

/// Loading wins over everything, then both-success yields the report, then
/// the first error (transactions before categories) is surfaced.
pub fn combine(
    transactions: &LoadState<Vec<Transaction>>,
    categories: &LoadState<Vec<Category>>,
    selection: StatisticsSelection,
    now: DateTime<Utc>,
    first_day_of_week: Weekday,
) -> LoadState<StatisticsReport> {
    match (transactions, categories) {
        (LoadState::Loading, _) | (_, LoadState::Loading) => LoadState::Loading,
        (LoadState::Success(transactions), LoadState::Success(_)) => {
            LoadState::Success(StatisticsService::report(
                transactions,
                selection.period,
                selection.kind,
                now,
                first_day_of_week,
            ))
        }
        (LoadState::Error(message), _) | (_, LoadState::Error(message)) => {
            LoadState::Error(message.clone())
        }
    }
}
