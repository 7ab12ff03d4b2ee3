//! Shared traits and enums for the finance records.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::MoneyError;

/// Exposes the document identifier of a stored record.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Records scoped to a single owning user.
pub trait UserOwned {
    fn user_id(&self) -> &str;
    fn set_user_id(&mut self, user_id: String);
}

/// Direction of money flow. Shared by transactions and categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl Default for TransactionKind {
    fn default() -> Self {
        TransactionKind::Expense
    }
}

impl TransactionKind {
    /// Value stored in the `type` document field.
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = MoneyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(MoneyError::Repository(format!(
                "unknown transaction type `{}`",
                other
            ))),
        }
    }
}
