//! Budget alert engine
//!
//! Pure functions deriving a budget's status from what was spent against
//! its limit. The backend reports alerts for the current month; budgets
//! with no alert row are treated as untouched.

use serde::{Deserialize, Serialize};

use crate::models::{Budget, BudgetAlert};

/// Spend at or above this share of the limit counts as near the limit
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    UnderBudget,
    NearLimit,
    OverBudget,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnderBudget => "under_budget",
            Self::NearLimit => "near_limit",
            Self::OverBudget => "over_budget",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UnderBudget => "Under Budget",
            Self::NearLimit => "Near Limit",
            Self::OverBudget => "Over Budget",
        }
    }

    /// Label used where a budget has spending but is comfortably inside it
    pub fn alias_label(&self) -> &'static str {
        match self {
            Self::UnderBudget => "On Track",
            other => other.label(),
        }
    }
}

impl std::str::FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "under_budget" | "on_track" => Ok(Self::UnderBudget),
            "near_limit" => Ok(Self::NearLimit),
            "over_budget" => Ok(Self::OverBudget),
            _ => Err(format!("Unknown budget status: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Display color class for a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// No spending recorded this month
    Neutral,
    Ok,
    Warning,
    Danger,
}

impl Indicator {
    pub fn for_status(status: BudgetStatus) -> Self {
        match status {
            BudgetStatus::UnderBudget => Self::Ok,
            BudgetStatus::NearLimit => Self::Warning,
            BudgetStatus::OverBudget => Self::Danger,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetEvaluation {
    /// Not clamped; 130.0 means 30% over
    pub percentage: f64,
    /// Never negative
    pub over_by: f64,
    pub status: BudgetStatus,
}

/// Derive percentage, overage and status from spend and limit
pub fn evaluate(spent: f64, limit: f64) -> BudgetEvaluation {
    let percentage = if limit > 0.0 {
        spent / limit * 100.0
    } else {
        0.0
    };
    let over_by = (spent - limit).max(0.0);

    let status = if over_by > 0.0 {
        BudgetStatus::OverBudget
    } else if percentage >= NEAR_LIMIT_PERCENT {
        BudgetStatus::NearLimit
    } else {
        BudgetStatus::UnderBudget
    };

    BudgetEvaluation {
        percentage,
        over_by,
        status,
    }
}

/// A budget joined with its evaluation for the current month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatusView {
    pub budget: Budget,
    /// Spend reported by the backend; zero when there is no alert row
    pub spent: f64,
    pub evaluation: BudgetEvaluation,
    pub indicator: Indicator,
}

impl BudgetStatusView {
    pub fn label(&self) -> &'static str {
        self.evaluation.status.label()
    }
}

/// Status for one budget given the month's alerts
///
/// Alerts are matched by category. A budget with no alert gets
/// `UnderBudget` and a neutral indicator.
pub fn status_for(budget: &Budget, alerts: &[BudgetAlert]) -> BudgetStatusView {
    match alerts.iter().find(|a| a.category == budget.category) {
        Some(alert) => {
            let evaluation = evaluate(alert.spent, budget.monthly_limit);
            BudgetStatusView {
                budget: budget.clone(),
                spent: alert.spent,
                indicator: Indicator::for_status(evaluation.status),
                evaluation,
            }
        }
        None => BudgetStatusView {
            budget: budget.clone(),
            spent: 0.0,
            evaluation: BudgetEvaluation {
                percentage: 0.0,
                over_by: 0.0,
                status: BudgetStatus::UnderBudget,
            },
            indicator: Indicator::Neutral,
        },
    }
}

/// Statuses for every budget, in budget order
pub fn budget_statuses(budgets: &[Budget], alerts: &[BudgetAlert]) -> Vec<BudgetStatusView> {
    budgets.iter().map(|b| status_for(b, alerts)).collect()
}
