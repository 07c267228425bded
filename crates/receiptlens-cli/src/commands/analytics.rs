//! Dashboard and analytics command implementations

use anyhow::Result;
use receiptlens_core::{evaluate, format_amount, FinanceClient, MonthlySpendPoint};

use super::{bar, truncate, user_error};

const CHART_WIDTH: usize = 30;

fn print_monthly_chart(points: &[MonthlySpendPoint]) {
    let max = points
        .iter()
        .map(|p| p.total_amount)
        .fold(0.0_f64, f64::max);
    for point in points {
        let fraction = if max > 0.0 {
            point.total_amount / max
        } else {
            0.0
        };
        println!(
            "   {} {} {:>10}",
            point.month,
            bar(fraction, CHART_WIDTH),
            format_amount(point.total_amount)
        );
    }
}

pub async fn cmd_dashboard(client: &FinanceClient) -> Result<()> {
    let dashboard = client
        .dashboard()
        .await
        .map_err(|e| user_error(e, "Failed to load dashboard"))?;

    println!();
    println!("📊 ReceiptLens Dashboard");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   This month: {}",
        format_amount(dashboard.current_month.total_spend)
    );

    if !dashboard.monthly.is_empty() {
        println!();
        println!("   Recent months:");
        print_monthly_chart(&dashboard.monthly);
    }

    println!();
    if dashboard.recent.is_empty() {
        println!("   No transactions yet. Upload a receipt with:");
        println!("     receiptlens receipts upload photo.jpg");
    } else {
        println!("   Latest transactions:");
        for tx in &dashboard.recent {
            println!(
                "   {} │ {:>10} │ {}",
                tx.transaction_date.format("%b %d"),
                format_amount(tx.amount),
                truncate(&tx.category, 30)
            );
        }
    }

    Ok(())
}

pub async fn cmd_analytics_monthly(client: &FinanceClient, months: u32) -> Result<()> {
    let points = client
        .monthly_spend(months)
        .await
        .map_err(|e| user_error(e, "Failed to load monthly spend"))?;

    if points.is_empty() {
        println!("No spending in the last {} months.", months);
        return Ok(());
    }

    println!();
    println!("📈 Monthly spend (last {} months)", months);
    println!("   ─────────────────────────────────────────────────────────────");
    print_monthly_chart(&points);

    Ok(())
}

pub async fn cmd_analytics_categories(client: &FinanceClient, months: u32) -> Result<()> {
    let categories = client
        .category_breakdown(months)
        .await
        .map_err(|e| user_error(e, "Failed to load category breakdown"))?;

    if categories.is_empty() {
        println!("No spending in the last {} months.", months);
        return Ok(());
    }

    let total: f64 = categories.iter().map(|c| c.total_amount).sum();

    println!();
    println!("🗂️  Spend by category (last {} months)", months);
    println!("   ─────────────────────────────────────────────────────────────");
    for category in &categories {
        let share = if total > 0.0 {
            category.total_amount / total
        } else {
            0.0
        };
        println!(
            "   {:<16} {} {:>10} {:>5.1}%",
            truncate(&category.category, 16),
            bar(share, 20),
            format_amount(category.total_amount),
            share * 100.0
        );
    }

    Ok(())
}

pub async fn cmd_analytics_alerts(client: &FinanceClient) -> Result<()> {
    let alerts = client
        .budget_alerts()
        .await
        .map_err(|e| user_error(e, "Failed to load budget alerts"))?;

    if alerts.is_empty() {
        println!("✅ All budgets are on track this month.");
        return Ok(());
    }

    println!();
    println!("🚨 Budget alerts");
    println!("   ─────────────────────────────────────────────────────────────");
    for alert in &alerts {
        let evaluation = evaluate(alert.spent, alert.limit);
        println!(
            "   {:<16} {} of {} ({:.0}%) │ {}",
            truncate(&alert.category, 16),
            format_amount(alert.spent),
            format_amount(alert.limit),
            evaluation.percentage,
            evaluation.status.label()
        );
        if evaluation.over_by > 0.0 {
            println!("      over by {}", format_amount(evaluation.over_by));
        }
    }

    Ok(())
}
