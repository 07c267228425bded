//! Session command implementations (register, login, logout, whoami, status)

use anyhow::{Context, Result};
use receiptlens_core::{AuthState, ClientConfig, Credentials, FinanceClient};

use super::{require_login, user_error};

pub async fn cmd_register(client: &FinanceClient, email: &str, password: &str) -> Result<()> {
    let user = client
        .register(&Credentials::new(email, password))
        .await
        .map_err(|e| user_error(e, "Registration failed"))?;

    println!("✅ Account created for {}", user.email);
    println!();
    println!("Next step:");
    println!("  receiptlens login --email {} --password <password>", user.email);

    Ok(())
}

pub async fn cmd_login(client: &FinanceClient, email: &str, password: &str) -> Result<()> {
    client
        .login(&Credentials::new(email, password))
        .await
        .map_err(|e| user_error(e, "Login failed"))?;

    println!("✅ Signed in as {}", email.trim());
    Ok(())
}

pub async fn cmd_logout(client: &FinanceClient) -> Result<()> {
    client.logout().await.context("Failed to clear session")?;
    println!("👋 Signed out");
    Ok(())
}

pub async fn cmd_whoami(client: &FinanceClient) -> Result<()> {
    require_login(client).await?;
    let user = client
        .current_user()
        .await
        .map_err(|e| user_error(e, "Failed to load user"))?;

    println!();
    println!("👤 {}", user.email);
    println!("   ID: {}", user.id);
    println!("   Member since: {}", user.created_at.format("%Y-%m-%d"));
    Ok(())
}

pub async fn cmd_status(client: &FinanceClient, config: &ClientConfig) -> Result<()> {
    println!();
    println!("📊 ReceiptLens Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   API: {}", config.api_base_url);
    println!("   Session file: {}", config.token_path.display());
    println!(
        "   Timeouts: {}s requests, {}s uploads",
        config.request_timeout.as_secs(),
        config.upload_timeout.as_secs()
    );

    let state = client
        .restore_session()
        .await
        .context("Failed to read session")?;
    match state {
        AuthState::Authenticated => match client.current_user().await {
            Ok(user) => println!("   🔓 Signed in as {}", user.email),
            Err(e) if e.is_unauthorized() => {
                println!("   ⚠️  Session expired, sign in again")
            }
            Err(e) => println!(
                "   🔓 Signed in (backend unreachable: {})",
                e.user_message("unknown error")
            ),
        },
        _ => println!("   🔒 Not signed in"),
    }

    Ok(())
}
