//! Integration tests for receiptlens-core
//!
//! These run the full client (HTTP transport, gateway middleware, cache and
//! pipeline) against the in-process mock backend.

use std::time::Duration;

use chrono::Utc;
use receiptlens_core::{
    test_utils::{MockBackend, MOCK_RECEIPT_TOTAL},
    ApiRequest, AuthState, BudgetStatus, ClientConfig, Credentials, Error, FinanceClient, IngestState,
    IngestionPipeline, NewBudget, NewTransaction, QueryGroup, ReceiptImage, TransactionFilter,
};
use tempfile::TempDir;

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "correct-horse";

fn config_for(backend: &MockBackend, dir: &TempDir) -> ClientConfig {
    ClientConfig {
        api_base_url: backend.url(),
        request_timeout: Duration::from_secs(5),
        upload_timeout: Duration::from_secs(10),
        token_path: dir.path().join("session.json"),
    }
}

/// Backend with a registered user and a client already logged in
async fn logged_in() -> (MockBackend, TempDir, FinanceClient) {
    let backend = MockBackend::start().await;
    backend.seed_user(EMAIL, PASSWORD);
    let dir = TempDir::new().unwrap();
    let client = FinanceClient::new(&config_for(&backend, &dir)).unwrap();
    client
        .login(&Credentials::new(EMAIL, PASSWORD))
        .await
        .expect("login should succeed");
    (backend, dir, client)
}

fn spend(amount: f64, category: &str) -> NewTransaction {
    NewTransaction {
        amount,
        category: category.to_string(),
        description: None,
        transaction_date: Utc::now(),
        is_recurring: false,
    }
}

fn jpeg() -> ReceiptImage {
    ReceiptImage::new("lunch.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0])
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_register_login_and_restore() {
    let backend = MockBackend::start().await;
    let dir = TempDir::new().unwrap();
    let config = config_for(&backend, &dir);

    let client = FinanceClient::new(&config).unwrap();
    assert_eq!(client.restore_session().await.unwrap(), AuthState::Unauthenticated);

    let user = client
        .register(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert_eq!(user.email, EMAIL);

    client.login(&Credentials::new(EMAIL, PASSWORD)).await.unwrap();
    assert_eq!(client.current_user().await.unwrap().id, user.id);

    // A new process picks the token up from disk
    let restarted = FinanceClient::new(&config).unwrap();
    assert_eq!(restarted.session().auth_state(), AuthState::Unknown);
    assert_eq!(
        restarted.restore_session().await.unwrap(),
        AuthState::Authenticated
    );
    assert_eq!(restarted.current_user().await.unwrap().email, EMAIL);
}

#[tokio::test]
async fn test_bad_credentials_surface_detail() {
    let backend = MockBackend::start().await;
    backend.seed_user(EMAIL, PASSWORD);
    let dir = TempDir::new().unwrap();
    let client = FinanceClient::new(&config_for(&backend, &dir)).unwrap();

    let err = client
        .login(&Credentials::new(EMAIL, "wrong-password"))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message("Login failed"), "Incorrect email or password");
    assert_eq!(client.session().is_authenticated(), Some(false));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let backend = MockBackend::start().await;
    backend.seed_user(EMAIL, PASSWORD);
    let dir = TempDir::new().unwrap();
    let client = FinanceClient::new(&config_for(&backend, &dir)).unwrap();

    let err = client
        .register(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message("Registration failed"), "Email already registered");
}

#[tokio::test]
async fn test_expired_token_clears_session() {
    let (backend, _dir, client) = logged_in().await;
    backend.revoke_tokens();

    let err = client.budgets().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
    assert_eq!(client.session().auth_state(), AuthState::Unauthenticated);
    assert!(client.session().get_token().await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_clears_token_and_cache() {
    let (_backend, _dir, client) = logged_in().await;
    client.current_user().await.unwrap();
    client.budgets().await.unwrap();
    assert!(!client.cache().is_empty());

    client.logout().await.unwrap();
    assert!(client.cache().is_empty());
    assert_eq!(client.session().auth_state(), AuthState::Unauthenticated);

    // Requests now go out without a token
    assert!(client.current_user().await.unwrap_err().is_unauthorized());
}

// =============================================================================
// Transactions and cache invalidation
// =============================================================================

#[tokio::test]
async fn test_created_transaction_visible_on_next_read() {
    let (_backend, _dir, client) = logged_in().await;
    let filter = TransactionFilter::recent(100);

    assert!(client.transactions(&filter).await.unwrap().is_empty());
    let before = client.current_month_spend().await.unwrap();
    assert_eq!(before.total_spend, 0.0);

    let created = client.create_transaction(&spend(12.5, "dining")).await.unwrap();

    let listed = client.transactions(&filter).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(client.current_month_spend().await.unwrap().total_spend, 12.5);

    client.delete_transaction(&created.id).await.unwrap();
    assert!(client.transactions(&filter).await.unwrap().is_empty());
    assert_eq!(client.cache().invalidation_count(QueryGroup::Transactions), 2);
    assert_eq!(client.cache().invalidation_count(QueryGroup::Analytics), 2);
}

#[tokio::test]
async fn test_category_filter() {
    let (_backend, _dir, client) = logged_in().await;
    client.create_transaction(&spend(10.0, "dining")).await.unwrap();
    client.create_transaction(&spend(20.0, "groceries")).await.unwrap();

    let dining = client
        .transactions(&TransactionFilter::recent(100).with_category("dining"))
        .await
        .unwrap();
    assert_eq!(dining.len(), 1);
    assert_eq!(dining[0].category, "dining");

    let breakdown = client.category_breakdown(3).await.unwrap();
    assert_eq!(breakdown[0].category, "groceries");
    assert_eq!(breakdown[0].total_amount, 20.0);
}

#[tokio::test]
async fn test_get_single_transaction() {
    let (_backend, _dir, client) = logged_in().await;
    let created = client.create_transaction(&spend(7.25, "coffee")).await.unwrap();

    let fetched = client.transaction(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let err = client.transaction("txn-9999").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message("x"), "Transaction not found");
}

#[tokio::test]
async fn test_delete_missing_transaction_is_not_found() {
    let (_backend, _dir, client) = logged_in().await;
    let err = client.delete_transaction("txn-9999").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message("x"), "Transaction not found");
    assert_eq!(client.cache().invalidation_count(QueryGroup::Transactions), 0);
}

#[tokio::test]
async fn test_out_of_range_months_never_sent() {
    let (backend, _dir, client) = logged_in().await;
    let served = backend.request_count();

    assert!(matches!(
        client.monthly_spend(25).await,
        Err(Error::Validation(_))
    ));
    assert_eq!(backend.request_count(), served);
}

// =============================================================================
// Budgets and alerts
// =============================================================================

#[tokio::test]
async fn test_budget_statuses() {
    let (_backend, _dir, client) = logged_in().await;

    for (category, limit) in [("groceries", 200.0), ("dining", 50.0), ("travel", 300.0)] {
        client
            .upsert_budget(&NewBudget {
                category: category.to_string(),
                monthly_limit: limit,
            })
            .await
            .unwrap();
    }
    client.create_transaction(&spend(180.0, "groceries")).await.unwrap();
    client.create_transaction(&spend(65.0, "dining")).await.unwrap();

    let views = client.budget_statuses().await.unwrap();
    let summary: Vec<_> = views
        .iter()
        .map(|v| (v.budget.category.as_str(), v.evaluation.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("groceries", BudgetStatus::NearLimit),
            ("dining", BudgetStatus::OverBudget),
            ("travel", BudgetStatus::UnderBudget),
        ]
    );
    assert_eq!(views[0].evaluation.percentage, 90.0);
    assert_eq!(views[1].evaluation.over_by, 15.0);
}

#[tokio::test]
async fn test_budget_upsert_replaces_limit() {
    let (_backend, _dir, client) = logged_in().await;
    let first = client
        .upsert_budget(&NewBudget {
            category: "dining".into(),
            monthly_limit: 50.0,
        })
        .await
        .unwrap();
    assert_eq!(client.budgets().await.unwrap().len(), 1);

    let second = client
        .upsert_budget(&NewBudget {
            category: "dining".into(),
            monthly_limit: 75.0,
        })
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let budgets = client.budgets().await.unwrap();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].monthly_limit, 75.0);

    client.delete_budget(&second.id).await.unwrap();
    assert!(client.budgets().await.unwrap().is_empty());
}

// =============================================================================
// Receipt ingestion
// =============================================================================

#[tokio::test]
async fn test_receipt_upload_creates_transaction() {
    let (_backend, _dir, client) = logged_in().await;
    let filter = TransactionFilter::recent(100);
    assert!(client.transactions(&filter).await.unwrap().is_empty());

    let mut pipeline = IngestionPipeline::new();
    pipeline.select_image(jpeg());
    let receipt = client.ingest_receipt(&mut pipeline).await.unwrap();

    assert_eq!(pipeline.progress(), 1.0);
    assert!(matches!(pipeline.state(), IngestState::Succeeded(r) if r.id == receipt.id));
    for group in [QueryGroup::Transactions, QueryGroup::Analytics, QueryGroup::Receipts] {
        assert_eq!(client.cache().invalidation_count(group), 1);
    }

    let listed = client.transactions(&filter).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].receipt_id.as_deref(), Some(receipt.id.as_str()));
    assert_eq!(listed[0].amount, MOCK_RECEIPT_TOTAL);

    let receipts = client.list_receipts(0, 20).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(client.get_receipt(&receipt.id).await.unwrap(), receipt);
}

#[tokio::test]
async fn test_offset_timestamps_decode() {
    let (_backend, _dir, client) = logged_in().await;

    // The backend sends timezone-aware timestamps
    let raw = client
        .api()
        .gateway()
        .send(ApiRequest::get("/users/me"))
        .await
        .unwrap();
    let body: serde_json::Value = raw.json().unwrap();
    let created_at = body["created_at"].as_str().unwrap();
    assert!(created_at.ends_with('Z') || created_at.ends_with("+00:00"));

    let user = client.current_user().await.unwrap();
    assert_eq!(user.email, EMAIL);

    let mut pipeline = IngestionPipeline::new();
    pipeline.select_image(jpeg());
    let receipt = client.ingest_receipt(&mut pipeline).await.unwrap();
    assert!(matches!(pipeline.state(), IngestState::Succeeded(_)));
    assert_eq!(client.cache().invalidation_count(QueryGroup::Transactions), 1);
    assert_eq!(
        client.get_receipt(&receipt.id).await.unwrap().created_at,
        receipt.created_at
    );
}

#[tokio::test]
async fn test_receipt_processing_failure() {
    let (backend, _dir, client) = logged_in().await;
    backend.fail_uploads(Some("no text found"));

    let mut pipeline = IngestionPipeline::new();
    pipeline.select_image(jpeg());
    let err = client.ingest_receipt(&mut pipeline).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(pipeline.progress(), 0.0);
    assert_eq!(
        pipeline.state(),
        &IngestState::Failed("Error processing receipt: no text found".into())
    );
    assert_eq!(client.cache().invalidation_count(QueryGroup::Transactions), 0);

    // Retrying after the backend recovers works from the same pipeline
    backend.fail_uploads(None);
    client.ingest_receipt(&mut pipeline).await.unwrap();
    assert_eq!(pipeline.progress(), 1.0);
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let (_backend, _dir, client) = logged_in().await;
    let err = client
        .upload_receipt(ReceiptImage::new("notes.txt", "text/plain", b"hello".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message("Failed to process receipt"), "File must be an image");
}

#[tokio::test]
async fn test_dashboard() {
    let (_backend, _dir, client) = logged_in().await;
    client.create_transaction(&spend(30.0, "dining")).await.unwrap();
    client.upload_receipt(jpeg()).await.unwrap();

    let dashboard = client.dashboard().await.unwrap();
    assert_eq!(dashboard.recent.len(), 2);
    assert!((dashboard.current_month.total_spend - (30.0 + MOCK_RECEIPT_TOTAL)).abs() < 1e-9);
    assert_eq!(dashboard.monthly.len(), 1);
}
