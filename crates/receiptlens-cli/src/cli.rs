//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ReceiptLens - Scan receipts, track spending, stay on budget
#[derive(Parser)]
#[command(name = "receiptlens")]
#[command(about = "Personal finance client for the ReceiptLens service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides config and RECEIPTLENS_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Session token file (overrides config and RECEIPTLENS_TOKEN_PATH)
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Config file to use instead of the default override location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        email: String,

        /// At least 8 characters
        #[arg(short, long)]
        password: String,
    },

    /// Sign in and store the session token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out and forget the session token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show session state and configuration
    Status,

    /// Upload and browse receipts
    Receipts {
        #[command(subcommand)]
        action: ReceiptsAction,
    },

    /// Manage transactions (list, add, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage monthly budgets (list, set, delete)
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },

    /// Current month spend, recent months and latest transactions
    Dashboard,

    /// Spending analytics
    Analytics {
        #[command(subcommand)]
        action: AnalyticsAction,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// Upload a receipt image for parsing
    Upload {
        /// Image file (jpg, png, ...)
        file: PathBuf,
    },

    /// List uploaded receipts
    List {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show one receipt
    Show {
        /// Receipt ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number to show (1-1000)
        #[arg(short, long, default_value = "100")]
        limit: u32,
    },

    /// Add a transaction by hand
    Add {
        #[arg(short, long)]
        amount: f64,

        #[arg(short, long)]
        category: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Mark as recurring
        #[arg(long)]
        recurring: bool,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets with their status this month
    List,

    /// Create a budget, or change the limit of an existing category
    Set {
        #[arg(short, long)]
        category: String,

        /// Monthly limit
        #[arg(short, long)]
        limit: f64,
    },

    /// Delete a budget
    Delete {
        /// Budget ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AnalyticsAction {
    /// Total spend per month
    Monthly {
        /// Months of history (1-24)
        #[arg(short, long, default_value = "12")]
        months: u32,
    },

    /// Spend per category
    Categories {
        /// Months of history (1-24)
        #[arg(short, long, default_value = "12")]
        months: u32,
    },

    /// Budgets near or over their limit
    Alerts,
}
