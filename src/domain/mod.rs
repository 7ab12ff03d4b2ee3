//! Finance records, their derived values and the drafts that produce them.

pub mod budget;
pub mod category;
pub mod common;
pub mod forms;
pub mod transaction;

pub use budget::{Budget, BudgetStatus};
pub use category::{Category, CategoryGroup};
pub use common::{Identifiable, TransactionKind, UserOwned};
pub use forms::{check_amount, BudgetDraft, TransactionDraft, FALLBACK_CATEGORY};
pub use transaction::Transaction;
