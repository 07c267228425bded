//! Shared command utilities
//!
//! This module contains:
//! - `resolve_config` - Layer CLI flags over file and environment config
//! - `open_client` - Build the finance client from a config
//! - `require_login` - Gate for commands that need a session
//! - Formatting helpers shared by the report commands

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use receiptlens_core::{config, AuthState, ClientConfig, Error, FinanceClient};

/// Config from file and environment, with command-line flags applied last
pub fn resolve_config(
    config_path: Option<&Path>,
    api_url: Option<&str>,
    token_file: Option<&Path>,
) -> Result<ClientConfig> {
    let mut config = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            ClientConfig::load_file(Some(path))
        }
        None => ClientConfig::load_file(config::default_config_path().as_deref()),
    }
    .context("Failed to load configuration")?;

    config.apply_env();

    if let Some(url) = api_url {
        config.set_api_base_url(url);
    }
    if let Some(path) = token_file {
        config.token_path = path.to_path_buf();
    }
    Ok(config)
}

pub fn open_client(config: &ClientConfig) -> Result<FinanceClient> {
    FinanceClient::new(config).context("Failed to set up API client")
}

/// Fail with a sign-in hint unless a session token is stored
pub async fn require_login(client: &FinanceClient) -> Result<()> {
    let state = client
        .restore_session()
        .await
        .context("Failed to read session")?;
    match state {
        AuthState::Authenticated => Ok(()),
        _ => anyhow::bail!(
            "Not logged in. Sign in with: receiptlens login --email <email> --password <password>"
        ),
    }
}

/// Turn a core error into the message a user should see
pub fn user_error(err: Error, fallback: &str) -> anyhow::Error {
    anyhow::anyhow!(err.user_message(fallback))
}

/// Parse a YYYY-MM-DD date argument
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Horizontal bar for a 0.0..=1.0 fraction
pub fn bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
