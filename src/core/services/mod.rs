pub mod budget_service;
pub mod category_service;
pub mod statistics_service;

pub use budget_service::{BudgetAlert, BudgetOverview, BudgetService};
pub use category_service::CategoryService;
pub use statistics_service::{
    format_compact_number, CategoryTotal, Period, StatisticsReport, StatisticsService, TrendPoint,
};

use crate::errors::MoneyError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] MoneyError),
    #[error("{0}")]
    Invalid(String),
}
