//! Screen state holders. Each owns its `watch` channels and at most one live
//! subscription task, which is aborted on reload and on drop.

pub mod budgets;
pub mod categories;
pub mod state;
pub mod statistics;
pub mod transactions;

pub use budgets::{BudgetViewModel, BudgetsView};
pub use categories::CategoryViewModel;
pub use state::{ActionResult, LoadEvent, LoadState};
pub use statistics::{combine, StatisticsSelection, StatisticsViewModel};
pub use transactions::{
    BatchDeleteReport, SelectionState, TransactionFilter, TransactionsViewModel,
};
