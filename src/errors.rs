use std::result::Result as StdResult;

use thiserror::Error;

/// Unified error type for domain, repository and storage layers.
#[derive(Error, Debug)]
pub enum MoneyError {
    #[error("User not logged in")]
    NotAuthenticated,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Repository error: {0}")]
    Repository(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = StdResult<T, MoneyError>;

/// Input rejected before any repository call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select a category")]
    BlankCategory,
    #[error("Amount is not a valid number")]
    InvalidAmount,
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Please select a month")]
    MissingPeriod,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email must not be empty")]
    BlankEmail,
    #[error("Name must not be empty")]
    BlankName,
    #[error("Subcategory type must match its parent")]
    CategoryTypeMismatch,
    #[error("Subcategories cannot have their own subcategories")]
    NestedTooDeep,
    #[error("Category cannot be its own parent")]
    SelfParent,
}

impl MoneyError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            MoneyError::Repository(message) | MoneyError::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for MoneyError {
    fn from(err: std::io::Error) -> Self {
        MoneyError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MoneyError {
    fn from(err: serde_json::Error) -> Self {
        MoneyError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert_transparently() {
        let err: MoneyError = ValidationError::PasswordMismatch.into();
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn repository_message_is_shown_verbatim() {
        let err = MoneyError::Repository("permission denied".into());
        assert_eq!(err.user_message(), "permission denied");
    }
}
