use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Identifiable, TransactionKind, UserOwned};

/// A single income or expense entry.
///
/// `month` and `year` duplicate information carried by `date` so the store can
/// filter on them directly. Older records leave them at `0`; use
/// [`Transaction::effective_month`] and [`Transaction::effective_year`] rather
/// than reading the fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub month: u32,
    #[serde(default)]
    pub year: i32,
}

impl Transaction {
    pub fn new(
        amount: f64,
        kind: TransactionKind,
        category: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            user_id: String::new(),
            amount,
            kind,
            category: category.into(),
            description: String::new(),
            date,
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Stored month when present, otherwise derived from the timestamp.
    pub fn effective_month(&self) -> u32 {
        if self.month == 0 {
            self.date.month()
        } else {
            self.month
        }
    }

    /// Stored year when present, otherwise derived from the timestamp.
    pub fn effective_year(&self) -> i32 {
        if self.year == 0 {
            self.date.year()
        } else {
            self.year
        }
    }

    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> &str {
        &self.id
    }
}

impl UserOwned for Transaction {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn set_user_id(&mut self, user_id: String) {
        self.user_id = user_id;
    }
}
