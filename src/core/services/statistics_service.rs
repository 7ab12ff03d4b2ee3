//! Turns a flat transaction list into period and category summaries for charts.

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{Transaction, TransactionKind};

use super::{ServiceError, ServiceResult};

/// Number of slices shown in the category donut chart.
pub const DONUT_SLICES: usize = 5;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKS_PER_MONTH: u32 = 4;
const COMPACT_SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Reporting window selectable on the statistics screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Period {
    Week,
    #[default]
    Month,
    Year,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Period::Week => "Week",
            Period::Month => "Month",
            Period::Year => "Year",
        };
        f.write_str(label)
    }
}

impl FromStr for Period {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(ServiceError::Invalid(format!("unknown period `{}`", other))),
        }
    }
}

/// Sum of one category within the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
    /// Share of the filtered total in `0.0..=1.0`.
    pub percentage: f64,
}

/// One bar of a trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub period: Period,
    pub kind: TransactionKind,
    pub total: f64,
    pub categories: Vec<CategoryTotal>,
    pub top_categories: Vec<CategoryTotal>,
    pub trend: Vec<TrendPoint>,
}

impl StatisticsReport {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Whether any trend bucket holds a positive sum.
    pub fn has_trend_data(&self) -> bool {
        self.trend.iter().any(|point| point.amount > 0.0)
    }
}

/// Stateless aggregation over transaction snapshots.
pub struct StatisticsService;

impl StatisticsService {
    /// Builds the full statistics view for `period` and `kind` as of `now`.
    pub fn report(
        transactions: &[Transaction],
        period: Period,
        kind: TransactionKind,
        now: DateTime<Utc>,
        first_day_of_week: Weekday,
    ) -> StatisticsReport {
        let filtered =
            Self::filter_transactions(transactions, period, kind, now, first_day_of_week);
        let categories = Self::category_totals(&filtered);
        let top_categories = categories.iter().take(DONUT_SLICES).cloned().collect();
        StatisticsReport {
            period,
            kind,
            total: filtered.iter().map(|txn| txn.amount).sum(),
            categories,
            top_categories,
            trend: Self::trend_series(transactions, period, kind, now),
        }
    }

    /// The `n` largest category totals, in the order `category_totals` yields.
    pub fn top_categories(filtered: &[Transaction], n: usize) -> Vec<CategoryTotal> {
        let mut totals = Self::category_totals(filtered);
        totals.truncate(n);
        totals
    }

    /// Selects transactions of `kind` that fall in the period containing `now`.
    ///
    /// The week window has a lower bound only: anything dated at or after the
    /// start of the current week is kept, future-dated entries included.
    pub fn filter_transactions(
        transactions: &[Transaction],
        period: Period,
        kind: TransactionKind,
        now: DateTime<Utc>,
        first_day_of_week: Weekday,
    ) -> Vec<Transaction> {
        let of_kind = transactions.iter().filter(|txn| txn.kind == kind);
        match period {
            Period::Week => {
                let start = Self::start_of_week(now, first_day_of_week);
                of_kind.filter(|txn| txn.date >= start).cloned().collect()
            }
            Period::Month => of_kind
                .filter(|txn| {
                    txn.effective_month() == now.month() && txn.effective_year() == now.year()
                })
                .cloned()
                .collect(),
            Period::Year => of_kind
                .filter(|txn| txn.effective_year() == now.year())
                .cloned()
                .collect(),
        }
    }

    /// Midnight of the most recent `first_day` on or before `now`.
    pub fn start_of_week(now: DateTime<Utc>, first_day: Weekday) -> DateTime<Utc> {
        let today = now.date_naive();
        let offset = (7 + today.weekday().num_days_from_monday()
            - first_day.num_days_from_monday())
            % 7;
        let start = today - Duration::days(i64::from(offset));
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN))
    }

    /// Groups by category name, largest sum first.
    pub fn category_totals(filtered: &[Transaction]) -> Vec<CategoryTotal> {
        let total: f64 = filtered.iter().map(|txn| txn.amount).sum();
        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
        for txn in filtered {
            *sums.entry(txn.category.as_str()).or_default() += txn.amount;
        }
        let mut totals: Vec<CategoryTotal> = sums
            .into_iter()
            .map(|(category, amount)| CategoryTotal {
                category: category.to_string(),
                amount,
                percentage: if total > 0.0 { amount / total } else { 0.0 },
            })
            .collect();
        // stable: ties stay in name order
        totals.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
        totals
    }

    /// Fixed-length series for the trend chart: 7 days, 4 weeks or 12 months.
    ///
    /// Unlike [`Self::filter_transactions`], this takes the unfiltered list;
    /// each bucket applies its own date test.
    pub fn trend_series(
        transactions: &[Transaction],
        period: Period,
        kind: TransactionKind,
        now: DateTime<Utc>,
    ) -> Vec<TrendPoint> {
        let of_kind: Vec<&Transaction> =
            transactions.iter().filter(|txn| txn.kind == kind).collect();
        match period {
            Period::Week => {
                let today = now.date_naive();
                (0..7i64)
                    .rev()
                    .map(|offset| {
                        let day = today - Duration::days(offset);
                        let amount = of_kind
                            .iter()
                            .filter(|txn| txn.date.date_naive() == day)
                            .map(|txn| txn.amount)
                            .sum();
                        TrendPoint {
                            label: day.format("%a").to_string(),
                            amount,
                        }
                    })
                    .collect()
            }
            Period::Month => (1..=WEEKS_PER_MONTH)
                .map(|week| {
                    let amount = of_kind
                        .iter()
                        .filter(|txn| {
                            txn.effective_year() == now.year()
                                && txn.effective_month() == now.month()
                                && week_of_month(txn.date.day()) == week
                        })
                        .map(|txn| txn.amount)
                        .sum();
                    TrendPoint {
                        label: format!("W{}", week),
                        amount,
                    }
                })
                .collect(),
            Period::Year => MONTH_LABELS
                .iter()
                .zip(1u32..)
                .map(|(label, month)| {
                    let amount = of_kind
                        .iter()
                        .filter(|txn| {
                            txn.effective_year() == now.year() && txn.effective_month() == month
                        })
                        .map(|txn| txn.amount)
                        .sum();
                    TrendPoint {
                        label: (*label).to_string(),
                        amount,
                    }
                })
                .collect(),
        }
    }

    /// Parses the period name used by the screen selector.
    pub fn parse_period(value: &str) -> ServiceResult<Period> {
        value.parse()
    }
}

/// Days 1-7 map to week 1, 8-14 to week 2 and so on. Days 29-31 land in week 5,
/// which the monthly chart does not show.
fn week_of_month(day_of_month: u32) -> u32 {
    (day_of_month - 1) / 7 + 1
}

/// Short human form of an amount: `950`, `1.5K`, `2.3M`.
pub fn format_compact_number(number: f64) -> String {
    if number < 1000.0 {
        return format!("{:.0}", number);
    }
    let exp = ((number.ln() / 1000f64.ln()) as usize).clamp(1, COMPACT_SUFFIXES.len());
    let scaled = number / 1000f64.powi(exp as i32);
    format!("{:.1}{}", scaled, COMPACT_SUFFIXES[exp - 1])
}
