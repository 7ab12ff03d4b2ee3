//! Budget roll-ups and threshold alerts over budget snapshots.

use serde::Serialize;

use crate::domain::{budget::progress_ratio, Budget};

/// Totals across every budget active for the selected period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetOverview {
    pub overall_budget: f64,
    pub overall_spent: f64,
    pub overall_remaining: f64,
    pub overall_progress: f64,
}

/// A budget that crossed the alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetAlert {
    /// Stable key so repeated alerts for the same budget replace each other.
    pub budget_id: String,
    pub budget_name: String,
    pub percent: u32,
}

impl BudgetAlert {
    pub fn title(&self) -> String {
        format!("Budget Alert: {}", self.budget_name)
    }

    pub fn body(&self) -> String {
        format!(
            "You have reached {}% of your {} budget.",
            self.percent, self.budget_name
        )
    }
}

/// Stateless budgeting utilities that operate over budget snapshots.
pub struct BudgetService;

impl BudgetService {
    pub fn overview(budgets: &[Budget]) -> BudgetOverview {
        let overall_budget: f64 = budgets.iter().map(|b| b.allocated_amount).sum();
        let overall_spent: f64 = budgets.iter().map(|b| b.spent_amount).sum();
        BudgetOverview {
            overall_budget,
            overall_spent,
            overall_remaining: overall_budget - overall_spent,
            overall_progress: progress_ratio(overall_spent, overall_budget),
        }
    }

    /// Budgets whose progress reached `threshold` (a ratio, `0.8` = 80%).
    pub fn alerts(budgets: &[Budget], threshold: f64) -> Vec<BudgetAlert> {
        budgets
            .iter()
            .filter(|budget| budget.allocated_amount > 0.0 && budget.progress() >= threshold)
            .map(|budget| BudgetAlert {
                budget_id: budget.id.clone(),
                budget_name: budget.category.clone(),
                percent: (budget.progress() * 100.0) as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(id: &str, allocated: f64, spent: f64) -> Budget {
        Budget {
            id: id.into(),
            ..Budget::for_month(id, allocated, 2024, 3)
                .unwrap()
                .with_spent(spent)
        }
    }

    #[test]
    fn overview_sums_all_budgets() {
        let overview =
            BudgetService::overview(&[budget("Food", 200.0, 50.0), budget("Fun", 100.0, 100.0)]);
        assert_eq!(overview.overall_budget, 300.0);
        assert_eq!(overview.overall_spent, 150.0);
        assert_eq!(overview.overall_remaining, 150.0);
        assert!((overview.overall_progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_overview_has_zero_progress() {
        assert_eq!(BudgetService::overview(&[]), BudgetOverview::default());
    }

    #[test]
    fn alerts_only_fire_at_threshold() {
        let budgets = [
            budget("Food", 100.0, 79.0),
            budget("Fun", 100.0, 80.0),
            budget("Rent", 0.0, 10.0),
        ];
        let alerts = BudgetService::alerts(&budgets, 0.8);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].budget_id, "Fun");
        assert_eq!(alerts[0].percent, 80);
        assert_eq!(alerts[0].title(), "Budget Alert: Fun");
        assert_eq!(alerts[0].body(), "You have reached 80% of your Fun budget.");
    }
}
