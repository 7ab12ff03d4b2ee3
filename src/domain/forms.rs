//! Input drafts collected by the edit screens, validated before any repository call.

use chrono::{DateTime, Datelike, Utc};

use super::{budget::Budget, common::TransactionKind, transaction::Transaction};
use crate::errors::ValidationError;

/// Category assigned when the user saves a transaction without picking one.
pub const FALLBACK_CATEGORY: &str = "Other";

fn parse_amount(raw: &str) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAmount)?;
    check_amount(value)
}

/// Money amounts must be finite and strictly positive.
pub fn check_amount(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidAmount);
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(value)
}

/// Raw fields of the add/edit transaction screen.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub id: Option<String>,
    pub amount: String,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub description: String,
    pub date: DateTime<Utc>,
}

impl TransactionDraft {
    pub fn new(amount: impl Into<String>, kind: TransactionKind, date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            amount: amount.into(),
            kind,
            category: None,
            description: String::new(),
            date,
        }
    }

    pub fn validate(&self) -> Result<Transaction, ValidationError> {
        let amount = parse_amount(&self.amount)?;
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_CATEGORY);
        let mut txn = Transaction::new(amount, self.kind, category, self.date)
            .with_description(self.description.trim());
        if let Some(id) = &self.id {
            txn.id = id.clone();
        }
        Ok(txn)
    }
}

/// Raw fields of the add/edit budget dialog.
#[derive(Debug, Clone, Default)]
pub struct BudgetDraft {
    /// Budget being edited, if any. Its id, owner, category and spent total are kept.
    pub existing: Option<Budget>,
    pub category: String,
    pub amount: String,
    /// Any instant inside the chosen month.
    pub month: Option<DateTime<Utc>>,
}

impl BudgetDraft {
    pub fn validate(&self) -> Result<Budget, ValidationError> {
        if self.category.trim().is_empty() {
            return Err(ValidationError::BlankCategory);
        }
        let allocated = parse_amount(&self.amount)?;
        let month = self.month.ok_or(ValidationError::MissingPeriod)?;
        let template = Budget::for_month(
            self.category.trim(),
            allocated,
            month.year(),
            month.month(),
        )
        .ok_or(ValidationError::MissingPeriod)?;

        Ok(match &self.existing {
            Some(existing) => Budget {
                allocated_amount: allocated,
                start_date: template.start_date,
                end_date: template.end_date,
                ..existing.clone()
            },
            None => template,
        })
    }
}
