//! Transaction command implementations

use anyhow::Result;
use chrono::{Local, NaiveTime};
use receiptlens_core::{format_amount, FinanceClient, NewTransaction, TransactionFilter};

use super::{parse_date, truncate, user_error};

pub async fn cmd_transactions_list(
    client: &FinanceClient,
    category: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    limit: u32,
) -> Result<()> {
    let mut filter = TransactionFilter::recent(limit).with_category(category.unwrap_or(""));
    filter.start_date = from.map(parse_date).transpose()?;
    filter.end_date = to.map(parse_date).transpose()?;

    let transactions = client
        .transactions(&filter)
        .await
        .map_err(|e| user_error(e, "Failed to load transactions"))?;

    if transactions.is_empty() {
        println!("No transactions found. Add one with:");
        println!("  receiptlens transactions add --amount 12.50 --category dining");
        return Ok(());
    }

    println!();
    println!("📝 Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    let mut total = 0.0;
    for tx in &transactions {
        total += tx.amount;
        let badge = if tx.receipt_id.is_some() { " 📄" } else { "" };
        println!(
            "   [{}] {} │ {:>10} │ {:<14} │ {}{}",
            tx.id,
            tx.transaction_date.format("%Y-%m-%d"),
            format_amount(tx.amount),
            truncate(&tx.category, 14),
            truncate(tx.description.as_deref().unwrap_or(""), 30),
            badge
        );
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {} transactions, {} total",
        transactions.len(),
        format_amount(total)
    );

    Ok(())
}

pub async fn cmd_transactions_add(
    client: &FinanceClient,
    amount: f64,
    category: &str,
    description: Option<String>,
    date: Option<&str>,
    recurring: bool,
) -> Result<()> {
    let date = match date {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };
    let transaction = NewTransaction {
        amount,
        category: category.trim().to_string(),
        description: description.filter(|d| !d.trim().is_empty()),
        transaction_date: date.and_time(NaiveTime::default()).and_utc(),
        is_recurring: recurring,
    };

    let created = client
        .create_transaction(&transaction)
        .await
        .map_err(|e| user_error(e, "Failed to add transaction"))?;

    println!(
        "✅ Added {} in {} on {} (ID: {})",
        format_amount(created.amount),
        created.category,
        created.transaction_date.format("%Y-%m-%d"),
        created.id
    );
    Ok(())
}

pub async fn cmd_transactions_delete(client: &FinanceClient, id: &str) -> Result<()> {
    client
        .delete_transaction(id)
        .await
        .map_err(|e| user_error(e, "Failed to delete transaction"))?;

    println!("🗑️  Deleted transaction {}", id);
    Ok(())
}
