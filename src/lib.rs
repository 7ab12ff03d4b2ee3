#![doc(test(attr(deny(warnings))))]

//! Money Manager Core holds the application logic behind a personal-finance
//! app: transactions, categories, budgets, statistics and the view models that
//! drive their screens, over a user-scoped document store.

pub mod auth;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod storage;
pub mod utils;
pub mod viewmodel;

pub use errors::{MoneyError, Result, ValidationError};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Money Manager Core tracing initialized.");
    });
}
