//! ReceiptLens CLI - Personal finance client
//!
//! Usage:
//!   receiptlens login --email E --password P   Sign in
//!   receiptlens receipts upload lunch.jpg      Parse a receipt
//!   receiptlens budgets                        Budget status this month
//!   receiptlens dashboard                      Spending overview

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::resolve_config(
        cli.config.as_deref(),
        cli.api_url.as_deref(),
        cli.token_file.as_deref(),
    )?;
    let client = commands::open_client(&config)?;

    match cli.command {
        Commands::Register { email, password } => {
            commands::cmd_register(&client, &email, &password).await
        }
        Commands::Login { email, password } => {
            commands::cmd_login(&client, &email, &password).await
        }
        Commands::Logout => commands::cmd_logout(&client).await,
        Commands::Whoami => commands::cmd_whoami(&client).await,
        Commands::Status => commands::cmd_status(&client, &config).await,
        Commands::Receipts { action } => {
            commands::require_login(&client).await?;
            match action {
                ReceiptsAction::Upload { file } => {
                    commands::cmd_receipts_upload(&client, &file).await
                }
                ReceiptsAction::List { limit } => commands::cmd_receipts_list(&client, limit).await,
                ReceiptsAction::Show { id } => commands::cmd_receipts_show(&client, &id).await,
            }
        }
        Commands::Transactions { action } => {
            commands::require_login(&client).await?;
            match action {
                None => {
                    commands::cmd_transactions_list(&client, None, None, None, 100).await
                }
                Some(TransactionsAction::List {
                    category,
                    from,
                    to,
                    limit,
                }) => {
                    commands::cmd_transactions_list(
                        &client,
                        category.as_deref(),
                        from.as_deref(),
                        to.as_deref(),
                        limit,
                    )
                    .await
                }
                Some(TransactionsAction::Add {
                    amount,
                    category,
                    description,
                    date,
                    recurring,
                }) => {
                    commands::cmd_transactions_add(
                        &client,
                        amount,
                        &category,
                        description,
                        date.as_deref(),
                        recurring,
                    )
                    .await
                }
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&client, &id).await
                }
            }
        }
        Commands::Budgets { action } => {
            commands::require_login(&client).await?;
            match action {
                None | Some(BudgetsAction::List) => commands::cmd_budgets_list(&client).await,
                Some(BudgetsAction::Set { category, limit }) => {
                    commands::cmd_budgets_set(&client, &category, limit).await
                }
                Some(BudgetsAction::Delete { id }) => {
                    commands::cmd_budgets_delete(&client, &id).await
                }
            }
        }
        Commands::Dashboard => {
            commands::require_login(&client).await?;
            commands::cmd_dashboard(&client).await
        }
        Commands::Analytics { action } => {
            commands::require_login(&client).await?;
            match action {
                AnalyticsAction::Monthly { months } => {
                    commands::cmd_analytics_monthly(&client, months).await
                }
                AnalyticsAction::Categories { months } => {
                    commands::cmd_analytics_categories(&client, months).await
                }
                AnalyticsAction::Alerts => commands::cmd_analytics_alerts(&client).await,
            }
        }
    }
}
