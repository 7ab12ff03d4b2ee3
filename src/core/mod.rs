//! Pure business logic: aggregation, budget roll-ups and category grouping.

pub mod clock;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
