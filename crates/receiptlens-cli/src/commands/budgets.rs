//! Budget command implementations

use anyhow::Result;
use receiptlens_core::{format_amount, BudgetStatusView, FinanceClient, Indicator, NewBudget};

use super::{bar, truncate, user_error};

/// Emoji marker for a budget's indicator
pub fn indicator_icon(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Neutral => "⚪",
        Indicator::Ok => "🟢",
        Indicator::Warning => "🟡",
        Indicator::Danger => "🔴",
    }
}

/// Label shown next to a budget
///
/// Budgets with no spending yet read "Under Budget"; ones with spending that
/// is still comfortably inside the limit read "On Track".
pub fn status_label(view: &BudgetStatusView) -> &'static str {
    match view.indicator {
        Indicator::Neutral => view.evaluation.status.label(),
        _ => view.evaluation.status.alias_label(),
    }
}

pub async fn cmd_budgets_list(client: &FinanceClient) -> Result<()> {
    let views = client
        .budget_statuses()
        .await
        .map_err(|e| user_error(e, "Failed to load budgets"))?;

    if views.is_empty() {
        println!("No budgets yet. Create one with:");
        println!("  receiptlens budgets set --category groceries --limit 400");
        return Ok(());
    }

    println!();
    println!("💰 Budgets this month");
    println!("   ─────────────────────────────────────────────────────────────");

    for view in &views {
        println!(
            "   {} {:<14} {} {:>5.0}% │ {} of {} │ {}",
            indicator_icon(view.indicator),
            truncate(&view.budget.category, 14),
            bar(view.evaluation.percentage / 100.0, 10),
            view.evaluation.percentage,
            format_amount(view.spent),
            format_amount(view.budget.monthly_limit),
            status_label(view)
        );
        if view.evaluation.over_by > 0.0 {
            println!(
                "      over by {}",
                format_amount(view.evaluation.over_by)
            );
        }
    }

    println!();
    println!("   IDs (for 'receiptlens budgets delete <id>'):");
    for view in &views {
        println!("     {} → {}", view.budget.category, view.budget.id);
    }

    Ok(())
}

pub async fn cmd_budgets_set(client: &FinanceClient, category: &str, limit: f64) -> Result<()> {
    let budget = client
        .upsert_budget(&NewBudget {
            category: category.to_string(),
            monthly_limit: limit,
        })
        .await
        .map_err(|e| user_error(e, "Failed to save budget"))?;

    println!(
        "✅ Budget for {} set to {} per month",
        budget.category,
        format_amount(budget.monthly_limit)
    );
    Ok(())
}

pub async fn cmd_budgets_delete(client: &FinanceClient, id: &str) -> Result<()> {
    client
        .delete_budget(id)
        .await
        .map_err(|e| user_error(e, "Failed to delete budget"))?;

    println!("🗑️  Deleted budget {}", id);
    Ok(())
}
