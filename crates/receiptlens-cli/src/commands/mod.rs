//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config resolution, client setup, login gate, formatting)
//! - `auth` - Session commands (register, login, logout, whoami, status)
//! - `receipts` - Receipt upload with progress, listing and detail
//! - `transactions` - Transaction commands (list, add, delete)
//! - `budgets` - Budget commands (list with status, set, delete)
//! - `analytics` - Dashboard and analytics reports

pub mod analytics;
pub mod auth;
pub mod budgets;
pub mod core;
pub mod receipts;
pub mod transactions;

// Re-export command functions for main.rs
pub use analytics::*;
pub use auth::*;
pub use budgets::*;
pub use self::core::*;
pub use receipts::*;
pub use transactions::*;
