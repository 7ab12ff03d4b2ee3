use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Identifiable, UserOwned};

/// Below this progress ratio a budget is considered healthy.
pub const WARNING_RATIO: f64 = 0.5;
/// Above this progress ratio a budget is considered exhausted.
pub const OVER_RATIO: f64 = 0.9;

/// A per-category spending cap for one coverage period.
///
/// `spent_amount` is a running total maintained by whoever writes the record;
/// it is not recomputed from transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub category: String,
    pub allocated_amount: f64,
    #[serde(default)]
    pub spent_amount: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_date: DateTime<Utc>,
}

impl Budget {
    /// Builds a budget spanning the whole calendar month, first instant to last second.
    pub fn for_month(
        category: impl Into<String>,
        allocated_amount: f64,
        year: i32,
        month: u32,
    ) -> Option<Self> {
        let (start_date, end_date) = month_bounds(year, month)?;
        Some(Self {
            id: String::new(),
            user_id: String::new(),
            category: category.into(),
            allocated_amount,
            spent_amount: 0.0,
            start_date,
            end_date,
        })
    }

    pub fn with_spent(mut self, spent_amount: f64) -> Self {
        self.spent_amount = spent_amount;
        self
    }

    /// Fraction of the allocation already spent; `0.0` when nothing is allocated.
    pub fn progress(&self) -> f64 {
        progress_ratio(self.spent_amount, self.allocated_amount)
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus::from_ratio(self.spent_amount, self.allocated_amount)
    }

    pub fn remaining(&self) -> f64 {
        self.allocated_amount - self.spent_amount
    }

    /// Inclusive on both ends, matching the store query.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_date <= instant && instant <= self.end_date
    }
}

impl Identifiable for Budget {
    fn id(&self) -> &str {
        &self.id
    }
}

impl UserOwned for Budget {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn set_user_id(&mut self, user_id: String) {
        self.user_id = user_id;
    }
}

/// Three-level health indicator derived from a budget's progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BudgetStatus {
    /// Less than 50% spent.
    Normal,
    /// Between 50% and 90% spent, inclusive.
    Warning,
    /// More than 90% spent.
    Over,
}

impl BudgetStatus {
    pub fn from_ratio(spent: f64, allocated: f64) -> Self {
        let progress = progress_ratio(spent, allocated);
        if progress < WARNING_RATIO {
            BudgetStatus::Normal
        } else if progress <= OVER_RATIO {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Over
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetStatus::Normal => "Normal",
            BudgetStatus::Warning => "Warning",
            BudgetStatus::Over => "Over",
        };
        f.write_str(label)
    }
}

pub(crate) fn progress_ratio(spent: f64, allocated: f64) -> f64 {
    if allocated > 0.0 {
        spent / allocated
    } else {
        0.0
    }
}

fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?);
    let end = Utc.from_utc_datetime(&next_first.and_hms_opt(0, 0, 0)?) - Duration::seconds(1);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn budget(allocated: f64, spent: f64) -> Budget {
        Budget::for_month("Food", allocated, 2024, 3)
            .unwrap()
            .with_spent(spent)
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(budget(100.0, 95.0).status(), BudgetStatus::Over);
        assert_eq!(budget(100.0, 60.0).status(), BudgetStatus::Warning);
        assert_eq!(budget(100.0, 10.0).status(), BudgetStatus::Normal);
        assert_eq!(budget(0.0, 0.0).status(), BudgetStatus::Normal);
    }

    #[test]
    fn boundaries_are_inclusive_for_warning() {
        assert_eq!(budget(100.0, 50.0).status(), BudgetStatus::Warning);
        assert_eq!(budget(100.0, 90.0).status(), BudgetStatus::Warning);
        assert_eq!(budget(100.0, 90.01).status(), BudgetStatus::Over);
        assert_eq!(budget(100.0, 49.99).status(), BudgetStatus::Normal);
    }

    #[test]
    fn zero_allocation_never_divides() {
        let b = budget(0.0, 40.0);
        assert_eq!(b.progress(), 0.0);
        assert_eq!(b.status(), BudgetStatus::Normal);
        let negative = budget(-10.0, 5.0);
        assert_eq!(negative.progress(), 0.0);
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let feb = Budget::for_month("Rent", 900.0, 2024, 2).unwrap();
        assert_eq!(feb.start_date.day(), 1);
        assert_eq!(feb.end_date.day(), 29);
        let dec = Budget::for_month("Rent", 900.0, 2023, 12).unwrap();
        assert_eq!(dec.end_date.month(), 12);
        assert_eq!(dec.end_date.day(), 31);
        assert!(Budget::for_month("Rent", 900.0, 2023, 13).is_none());
    }

    #[test]
    fn covers_is_inclusive() {
        let b = budget(100.0, 0.0);
        assert!(b.covers(b.start_date));
        assert!(b.covers(b.end_date));
        assert!(!b.covers(b.end_date + Duration::seconds(1)));
    }

    #[test]
    fn remaining_can_go_negative() {
        assert_eq!(budget(100.0, 130.0).remaining(), -30.0);
    }
}
