//! Test utilities for receiptlens-core
//!
//! A mock ReceiptLens backend served by axum on a random local port. It
//! keeps users, tokens, receipts, transactions and budgets in memory and
//! answers with the same shapes, status codes and `detail` messages as the
//! real service.
//!
//! Analytics ignore date windows: every stored transaction counts toward
//! the current month.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::models::{
    Budget, BudgetAlert, CategorySpend, Credentials, CurrentMonthSpend, MonthlySpendPoint,
    NewBudget, NewTransaction, Receipt, TokenResponse, Transaction, User, MAX_ANALYTICS_MONTHS,
    MAX_PAGE_LIMIT, MIN_PASSWORD_LEN,
};

/// Vendor and totals the mock "parses" out of every uploaded image
pub const MOCK_VENDOR: &str = "Mock Store";
pub const MOCK_RECEIPT_TOTAL: f64 = 42.10;
pub const MOCK_RECEIPT_CATEGORY: &str = "groceries";

#[derive(Default)]
struct MockState {
    users: HashMap<String, (User, String)>,
    tokens: HashMap<String, String>,
    receipts: Vec<Receipt>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
    next_id: u64,
    upload_failure: Option<String>,
    requests: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn create_user(&mut self, email: &str, password: &str) -> User {
        let user = User {
            id: self.next_id("user"),
            email: email.to_string(),
            created_at: now(),
        };
        self.users
            .insert(email.to_string(), (user.clone(), password.to_string()));
        user
    }

    fn issue_token(&mut self, user_id: &str) -> String {
        let token = format!("mock-token-{}", self.next_id("tok"));
        self.tokens.insert(token.clone(), user_id.to_string());
        token
    }

    fn user_transactions(&self, user_id: &str) -> impl Iterator<Item = &Transaction> + '_ {
        let user_id = user_id.to_string();
        self.transactions
            .iter()
            .filter(move |t| t.user_id == user_id)
    }
}

type Shared = Arc<Mutex<MockState>>;

/// Mock backend for tests and local development
pub struct MockBackend {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    /// Start the mock backend on an available port
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));

        let app = Router::new()
            .route("/auth/register", post(handle_register))
            .route("/auth/login", post(handle_login))
            .route("/users/me", get(handle_me))
            .route("/receipts/upload", post(handle_upload))
            .route("/receipts", get(handle_list_receipts))
            .route("/receipts/:id", get(handle_get_receipt))
            .route(
                "/transactions",
                get(handle_list_transactions).post(handle_create_transaction),
            )
            .route(
                "/transactions/:id",
                get(handle_get_transaction).delete(handle_delete_transaction),
            )
            .route("/budgets", get(handle_list_budgets).post(handle_upsert_budget))
            .route("/budgets/:id", delete(handle_delete_budget))
            .route("/analytics/monthly-spend", get(handle_monthly_spend))
            .route("/analytics/category-breakdown", get(handle_category_breakdown))
            .route("/analytics/budget-alerts", get(handle_budget_alerts))
            .route("/analytics/current-month-spend", get(handle_current_month_spend))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock backend
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a user directly, bypassing the API
    pub fn seed_user(&self, email: &str, password: &str) -> User {
        self.state.lock().unwrap().create_user(email, password)
    }

    /// Mint a valid token for an existing user
    pub fn token_for(&self, email: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        let user_id = state.users.get(email)?.0.id.clone();
        Some(state.issue_token(&user_id))
    }

    /// Invalidate every issued token, as if the server rotated its key
    pub fn revoke_tokens(&self) {
        self.state.lock().unwrap().tokens.clear();
    }

    /// Make receipt processing fail with this message until reset
    pub fn fail_uploads(&self, message: Option<&str>) {
        self.state.lock().unwrap().upload_failure = message.map(str::to_string);
    }

    /// Requests served so far
    pub fn request_count(&self) -> u64 {
        self.state.lock().unwrap().requests
    }

    /// Stop the mock backend
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// FastAPI-shaped error response
struct ApiError(StatusCode, serde_json::Value);

impl ApiError {
    fn detail(status: StatusCode, message: &str) -> Self {
        Self(status, json!(message))
    }

    /// 422 with the validation list form
    fn invalid(field: &str, message: &str) -> Self {
        Self(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["query", field], "msg": message, "type": "value_error" }]),
        )
    }

    fn not_found(what: &str) -> Self {
        Self::detail(StatusCode::NOT_FOUND, &format!("{} not found", what))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Resolve the bearer token to a user id, counting the request
fn authorize(state: &Shared, headers: &HeaderMap) -> ApiResult<String> {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.get(token).cloned())
        .ok_or_else(|| {
            ApiError::detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
        })
}

// ========== Auth ==========

async fn handle_register(
    State(state): State<Shared>,
    Json(body): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{
                "loc": ["body", "password"],
                "msg": format!("String should have at least {} characters", MIN_PASSWORD_LEN),
                "type": "string_too_short"
            }]),
        ));
    }
    if state.users.contains_key(&body.email) {
        return Err(ApiError::detail(
            StatusCode::BAD_REQUEST,
            "Email already registered",
        ));
    }
    let user = state.create_user(&body.email, &body.password);
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn handle_login(
    State(state): State<Shared>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    let user_id = match state.users.get(&form.username) {
        Some((user, password)) if *password == form.password => user.id.clone(),
        _ => {
            return Err(ApiError::detail(
                StatusCode::UNAUTHORIZED,
                "Incorrect email or password",
            ))
        }
    };
    let token = state.issue_token(&user_id);
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn handle_me(State(state): State<Shared>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    state
        .users
        .values()
        .find(|(u, _)| u.id == user_id)
        .map(|(u, _)| Json(u.clone()))
        .ok_or_else(|| ApiError::not_found("User"))
}

// ========== Receipts ==========

async fn handle_upload(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Receipt>)> {
    let user_id = authorize(&state, &headers)?;

    let mut upload: Option<(String, Option<String>, usize)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("receipt.jpg").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::detail(StatusCode::BAD_REQUEST, &e.to_string()))?;
        upload = Some((file_name, content_type, data.len()));
    }

    let (file_name, content_type, _size) = upload.ok_or_else(|| {
        ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["body", "file"], "msg": "Field required", "type": "missing" }]),
        )
    })?;
    if !content_type.unwrap_or_default().starts_with("image/") {
        return Err(ApiError::detail(
            StatusCode::BAD_REQUEST,
            "File must be an image",
        ));
    }

    let mut state = state.lock().unwrap();
    if let Some(reason) = state.upload_failure.clone() {
        return Err(ApiError::detail(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Error processing receipt: {}", reason),
        ));
    }

    let receipt_id = state.next_id("rcpt");
    let at = now();
    let receipt = Receipt {
        id: receipt_id.clone(),
        user_id: user_id.clone(),
        image_path: format!("uploads/{}/{}", user_id, file_name),
        vendor: Some(MOCK_VENDOR.to_string()),
        purchase_date: at,
        total_amount: MOCK_RECEIPT_TOTAL,
        tax_amount: 3.20,
        currency: "USD".to_string(),
        category: Some(MOCK_RECEIPT_CATEGORY.to_string()),
        raw_ocr_text: Some(format!("{}\nTOTAL {:.2}", MOCK_VENDOR, MOCK_RECEIPT_TOTAL)),
        created_at: at,
    };
    let transaction = Transaction {
        id: state.next_id("txn"),
        user_id,
        receipt_id: Some(receipt_id),
        amount: MOCK_RECEIPT_TOTAL,
        category: MOCK_RECEIPT_CATEGORY.to_string(),
        description: Some(format!("Receipt from {}", MOCK_VENDOR)),
        transaction_date: at,
        is_recurring: false,
        created_at: at,
    };
    state.receipts.push(receipt.clone());
    state.transactions.push(transaction);

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Deserialize)]
struct PageQuery {
    skip: Option<usize>,
    limit: Option<usize>,
}

async fn handle_list_receipts(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Receipt>>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    let receipts = state
        .receipts
        .iter()
        .rev()
        .filter(|r| r.user_id == user_id)
        .skip(page.skip.unwrap_or(0))
        .take(page.limit.unwrap_or(100))
        .cloned()
        .collect();
    Ok(Json(receipts))
}

async fn handle_get_receipt(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Receipt>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    state
        .receipts
        .iter()
        .find(|r| r.id == id && r.user_id == user_id)
        .map(|r| Json(r.clone()))
        .ok_or_else(|| ApiError::not_found("Receipt"))
}

// ========== Transactions ==========

#[derive(Deserialize)]
struct TransactionQuery {
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
    category: Option<String>,
    skip: Option<usize>,
    limit: Option<u32>,
}

async fn handle_list_transactions(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let user_id = authorize(&state, &headers)?;
    let limit = query.limit.unwrap_or(100);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::invalid(
            "limit",
            &format!("Input should be between 1 and {}", MAX_PAGE_LIMIT),
        ));
    }

    let state = state.lock().unwrap();
    let mut matching: Vec<Transaction> = state
        .user_transactions(&user_id)
        .filter(|t| query.start_date.map_or(true, |s| t.transaction_date >= s.and_utc()))
        .filter(|t| query.end_date.map_or(true, |e| t.transaction_date <= e.and_utc()))
        .filter(|t| query.category.as_ref().map_or(true, |c| &t.category == c))
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));

    Ok(Json(
        matching
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(limit as usize)
            .collect(),
    ))
}

async fn handle_create_transaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewTransaction>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let user_id = authorize(&state, &headers)?;
    let mut state = state.lock().unwrap();
    let transaction = Transaction {
        id: state.next_id("txn"),
        user_id,
        receipt_id: None,
        amount: body.amount,
        category: body.category,
        description: body.description,
        transaction_date: body.transaction_date,
        is_recurring: body.is_recurring,
        created_at: now(),
    };
    state.transactions.push(transaction.clone());
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn handle_get_transaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    let found = state
        .user_transactions(&user_id)
        .find(|t| t.id == id)
        .map(|t| Json(t.clone()))
        .ok_or_else(|| ApiError::not_found("Transaction"));
    found
}

async fn handle_delete_transaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = authorize(&state, &headers)?;
    let mut state = state.lock().unwrap();
    let before = state.transactions.len();
    state
        .transactions
        .retain(|t| !(t.id == id && t.user_id == user_id));
    if state.transactions.len() == before {
        return Err(ApiError::not_found("Transaction"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ========== Budgets ==========

async fn handle_list_budgets(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Budget>>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    Ok(Json(
        state
            .budgets
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect(),
    ))
}

async fn handle_upsert_budget(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewBudget>,
) -> ApiResult<(StatusCode, Json<Budget>)> {
    let user_id = authorize(&state, &headers)?;
    let mut state = state.lock().unwrap();

    if let Some(existing) = state
        .budgets
        .iter_mut()
        .find(|b| b.user_id == user_id && b.category == body.category)
    {
        existing.monthly_limit = body.monthly_limit;
        existing.updated_at = Some(now());
        return Ok((StatusCode::CREATED, Json(existing.clone())));
    }

    let budget = Budget {
        id: state.next_id("bdgt"),
        user_id,
        category: body.category,
        monthly_limit: body.monthly_limit,
        created_at: now(),
        updated_at: None,
    };
    state.budgets.push(budget.clone());
    Ok((StatusCode::CREATED, Json(budget)))
}

async fn handle_delete_budget(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = authorize(&state, &headers)?;
    let mut state = state.lock().unwrap();
    let before = state.budgets.len();
    state
        .budgets
        .retain(|b| !(b.id == id && b.user_id == user_id));
    if state.budgets.len() == before {
        return Err(ApiError::not_found("Budget"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ========== Analytics ==========

#[derive(Deserialize)]
struct MonthsQuery {
    months: Option<u32>,
}

fn check_months(query: &MonthsQuery) -> ApiResult<u32> {
    let months = query.months.unwrap_or(12);
    if months == 0 || months > MAX_ANALYTICS_MONTHS {
        return Err(ApiError::invalid(
            "months",
            &format!("Input should be between 1 and {}", MAX_ANALYTICS_MONTHS),
        ));
    }
    Ok(months)
}

async fn handle_monthly_spend(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<MonthsQuery>,
) -> ApiResult<Json<Vec<MonthlySpendPoint>>> {
    let user_id = authorize(&state, &headers)?;
    check_months(&query)?;
    let state = state.lock().unwrap();

    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    for t in state.user_transactions(&user_id) {
        *by_month
            .entry(t.transaction_date.format("%Y-%m").to_string())
            .or_insert(0.0) += t.amount;
    }
    Ok(Json(
        by_month
            .into_iter()
            .map(|(month, total_amount)| MonthlySpendPoint {
                month,
                total_amount,
            })
            .collect(),
    ))
}

async fn handle_category_breakdown(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<MonthsQuery>,
) -> ApiResult<Json<Vec<CategorySpend>>> {
    let user_id = authorize(&state, &headers)?;
    check_months(&query)?;
    let state = state.lock().unwrap();

    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    for t in state.user_transactions(&user_id) {
        *by_category.entry(t.category.clone()).or_insert(0.0) += t.amount;
    }
    let mut breakdown: Vec<CategorySpend> = by_category
        .into_iter()
        .map(|(category, total_amount)| CategorySpend {
            category,
            total_amount,
        })
        .collect();
    breakdown.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    Ok(Json(breakdown))
}

/// Budgets at or above 80% of their limit, with raw `spent - limit`
async fn handle_budget_alerts(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<BudgetAlert>>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();

    let alerts = state
        .budgets
        .iter()
        .filter(|b| b.user_id == user_id)
        .filter_map(|b| {
            let spent: f64 = state
                .user_transactions(&user_id)
                .filter(|t| t.category == b.category)
                .map(|t| t.amount)
                .sum();
            let percentage = if b.monthly_limit > 0.0 {
                spent / b.monthly_limit * 100.0
            } else {
                0.0
            };
            let over_by = spent - b.monthly_limit;
            (percentage >= 80.0 || over_by > 0.0).then(|| BudgetAlert {
                category: b.category.clone(),
                spent,
                limit: b.monthly_limit,
                percentage,
                over_by,
            })
        })
        .collect();
    Ok(Json(alerts))
}

async fn handle_current_month_spend(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> ApiResult<Json<CurrentMonthSpend>> {
    let user_id = authorize(&state, &headers)?;
    let state = state.lock().unwrap();
    Ok(Json(CurrentMonthSpend {
        total_spend: state.user_transactions(&user_id).map(|t| t.amount).sum(),
    }))
}
