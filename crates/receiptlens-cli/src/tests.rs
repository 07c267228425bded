//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::time::Duration;

use receiptlens_core::test_utils::MockBackend;
use receiptlens_core::{
    evaluate, AuthState, Budget, BudgetStatusView, ClientConfig, FinanceClient, Indicator,
};
use tempfile::TempDir;

use crate::commands::{self, bar, parse_date, truncate};

const EMAIL: &str = "sam@example.com";
const PASSWORD: &str = "password123";

fn test_config(backend: &MockBackend, dir: &TempDir) -> ClientConfig {
    ClientConfig {
        api_base_url: backend.url(),
        request_timeout: Duration::from_secs(5),
        upload_timeout: Duration::from_secs(10),
        token_path: dir.path().join("session.json"),
    }
}

async fn setup() -> (MockBackend, TempDir, FinanceClient) {
    let backend = MockBackend::start().await;
    backend.seed_user(EMAIL, PASSWORD);
    let dir = TempDir::new().unwrap();
    let client = commands::open_client(&test_config(&backend, &dir)).unwrap();
    (backend, dir, client)
}

async fn setup_logged_in() -> (MockBackend, TempDir, FinanceClient) {
    let (backend, dir, client) = setup().await;
    commands::cmd_login(&client, EMAIL, PASSWORD).await.unwrap();
    (backend, dir, client)
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("groceries", 20), "groceries");
    assert_eq!(truncate("a very long description here", 10), "a very ...");
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}

#[test]
fn test_bar() {
    assert_eq!(bar(0.0, 4), "░░░░");
    assert_eq!(bar(0.5, 4), "██░░");
    assert_eq!(bar(1.0, 4), "████");
    // Over-limit and garbage input stay within the width
    assert_eq!(bar(1.3, 4), "████");
    assert_eq!(bar(f64::NAN, 4), "░░░░");
}

#[test]
fn test_parse_date() {
    let d = parse_date("2024-03-09").unwrap();
    assert_eq!(d.to_string(), "2024-03-09");
    assert!(parse_date("03/09/2024").is_err());
}

#[test]
fn test_status_label() {
    let budget = Budget {
        id: "b1".into(),
        user_id: "u1".into(),
        category: "dining".into(),
        monthly_limit: 100.0,
        created_at: parse_date("2024-01-01")
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc(),
        updated_at: None,
    };
    let view = |spent: f64, indicator: Indicator| BudgetStatusView {
        budget: budget.clone(),
        spent,
        evaluation: evaluate(spent, 100.0),
        indicator,
    };

    assert_eq!(commands::status_label(&view(0.0, Indicator::Neutral)), "Under Budget");
    assert_eq!(commands::status_label(&view(40.0, Indicator::Ok)), "On Track");
    assert_eq!(commands::status_label(&view(85.0, Indicator::Warning)), "Near Limit");
    assert_eq!(commands::status_label(&view(120.0, Indicator::Danger)), "Over Budget");
    assert_eq!(commands::indicator_icon(Indicator::Danger), "🔴");
}

#[test]
fn test_resolve_config_flags_win() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("client.toml");
    std::fs::write(&path, "[api]\nbase_url = \"http://from-file:8000\"\n").unwrap();

    let token = dir.path().join("tok.json");
    let config = commands::resolve_config(
        Some(&path),
        Some("http://from-flag:9000/"),
        Some(&token),
    )
    .unwrap();
    assert_eq!(config.api_base_url, "http://from-flag:9000");
    assert_eq!(config.token_path, token);
}

#[test]
fn test_resolve_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::resolve_config(Some(&dir.path().join("absent.toml")), None, None);
    assert!(result.is_err());
}

// ========== Session Command Tests ==========

#[tokio::test]
async fn test_cmd_register_and_login() {
    let backend = MockBackend::start().await;
    let dir = TempDir::new().unwrap();
    let client = commands::open_client(&test_config(&backend, &dir)).unwrap();

    commands::cmd_register(&client, "new@example.com", "longpassword")
        .await
        .unwrap();
    commands::cmd_login(&client, "new@example.com", "longpassword")
        .await
        .unwrap();
    assert_eq!(client.session().auth_state(), AuthState::Authenticated);

    commands::cmd_whoami(&client).await.unwrap();
}

#[tokio::test]
async fn test_cmd_login_short_password() {
    let (_backend, _dir, client) = setup().await;
    let err = commands::cmd_login(&client, EMAIL, "short").await.unwrap_err();
    assert_eq!(err.to_string(), "Password must be at least 8 characters");
}

#[tokio::test]
async fn test_cmd_login_wrong_password() {
    let (_backend, _dir, client) = setup().await;
    let err = commands::cmd_login(&client, EMAIL, "not-the-password")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Incorrect email or password");
}

#[tokio::test]
async fn test_require_login_when_signed_out() {
    let (_backend, _dir, client) = setup().await;
    let err = commands::require_login(&client).await.unwrap_err();
    assert!(err.to_string().contains("Not logged in"));

    let err = commands::cmd_whoami(&client).await.unwrap_err();
    assert!(err.to_string().contains("Not logged in"));
}

#[tokio::test]
async fn test_cmd_logout() {
    let (_backend, _dir, client) = setup_logged_in().await;
    commands::cmd_logout(&client).await.unwrap();
    assert_eq!(client.session().auth_state(), AuthState::Unauthenticated);
    assert!(commands::require_login(&client).await.is_err());
}

#[tokio::test]
async fn test_cmd_status_any_state() {
    let (backend, dir, client) = setup().await;
    let config = test_config(&backend, &dir);
    commands::cmd_status(&client, &config).await.unwrap();

    commands::cmd_login(&client, EMAIL, PASSWORD).await.unwrap();
    assert_eq!(client.session().auth_state(), AuthState::Authenticated);

    // Revoked session is reported, not an error
    backend.revoke_tokens();
    commands::cmd_status(&client, &config).await.unwrap();
    assert_eq!(client.session().auth_state(), AuthState::Unauthenticated);
}

// ========== Transaction Command Tests ==========

#[tokio::test]
async fn test_cmd_transactions_add_list_delete() {
    let (_backend, _dir, client) = setup_logged_in().await;

    commands::cmd_transactions_add(
        &client,
        12.5,
        "dining",
        Some("Lunch".to_string()),
        Some("2024-05-01"),
        false,
    )
    .await
    .unwrap();

    commands::cmd_transactions_list(&client, Some("dining"), Some("2024-05-01"), None, 100)
        .await
        .unwrap();

    let listed = client
        .transactions(&receiptlens_core::TransactionFilter::recent(100))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description.as_deref(), Some("Lunch"));

    commands::cmd_transactions_delete(&client, &listed[0].id)
        .await
        .unwrap();
    let err = commands::cmd_transactions_delete(&client, &listed[0].id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Transaction not found");
}

#[tokio::test]
async fn test_cmd_transactions_add_invalid() {
    let (_backend, _dir, client) = setup_logged_in().await;
    let err = commands::cmd_transactions_add(&client, -5.0, "dining", None, None, false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Amount must be a positive number");

    let err = commands::cmd_transactions_list(&client, None, Some("yesterday"), None, 10)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("YYYY-MM-DD"));
}

// ========== Budget Command Tests ==========

#[tokio::test]
async fn test_cmd_budgets() {
    let (_backend, _dir, client) = setup_logged_in().await;

    commands::cmd_budgets_list(&client).await.unwrap();
    commands::cmd_budgets_set(&client, "groceries", 200.0)
        .await
        .unwrap();
    commands::cmd_transactions_add(&client, 180.0, "groceries", None, None, false)
        .await
        .unwrap();
    commands::cmd_budgets_list(&client).await.unwrap();

    let budgets = client.budgets().await.unwrap();
    assert_eq!(budgets.len(), 1);
    commands::cmd_budgets_delete(&client, &budgets[0].id)
        .await
        .unwrap();
    assert!(client.budgets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_budgets_set_invalid_limit() {
    let (_backend, _dir, client) = setup_logged_in().await;
    let err = commands::cmd_budgets_set(&client, "dining", 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Limit must be a positive number");
}

// ========== Receipt Command Tests ==========

#[tokio::test]
async fn test_cmd_receipts_upload() {
    let (_backend, dir, client) = setup_logged_in().await;
    let image = dir.path().join("lunch.jpg");
    std::fs::write(&image, [0xff, 0xd8, 0xff, 0xe0]).unwrap();

    commands::cmd_receipts_upload(&client, &image).await.unwrap();

    let receipts = client.list_receipts(0, 20).await.unwrap();
    assert_eq!(receipts.len(), 1);
    commands::cmd_receipts_list(&client, 20).await.unwrap();
    commands::cmd_receipts_show(&client, &receipts[0].id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cmd_receipts_upload_failure_message() {
    let (backend, dir, client) = setup_logged_in().await;
    backend.fail_uploads(Some("image too blurry"));
    let image = dir.path().join("blurry.png");
    std::fs::write(&image, [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let err = commands::cmd_receipts_upload(&client, &image)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error processing receipt: image too blurry"
    );
}

#[tokio::test]
async fn test_cmd_receipts_upload_missing_file() {
    let (_backend, dir, client) = setup_logged_in().await;
    let err = commands::cmd_receipts_upload(&client, &dir.path().join("nope.jpg"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}

// ========== Analytics Command Tests ==========

#[tokio::test]
async fn test_cmd_analytics() {
    let (_backend, _dir, client) = setup_logged_in().await;

    // Empty account renders without errors
    commands::cmd_dashboard(&client).await.unwrap();
    commands::cmd_analytics_alerts(&client).await.unwrap();

    commands::cmd_budgets_set(&client, "dining", 50.0).await.unwrap();
    commands::cmd_transactions_add(&client, 65.0, "dining", None, None, false)
        .await
        .unwrap();

    commands::cmd_dashboard(&client).await.unwrap();
    commands::cmd_analytics_monthly(&client, 6).await.unwrap();
    commands::cmd_analytics_categories(&client, 6).await.unwrap();
    commands::cmd_analytics_alerts(&client).await.unwrap();

    let err = commands::cmd_analytics_monthly(&client, 30).await.unwrap_err();
    assert_eq!(err.to_string(), "Months must be between 1 and 24");
}
