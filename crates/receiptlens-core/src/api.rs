//! Typed client for the ReceiptLens backend
//!
//! One method per endpoint. Every call goes through the `Gateway`, so
//! auth headers, 401 handling and error classification live there; this
//! layer only shapes requests and decodes responses. Input is validated
//! before anything is sent.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::gateway::{ApiRequest, FilePart, Gateway};
use crate::ingest::{ReceiptImage, ReceiptUploader};
use crate::models::{
    validate_months, Budget, BudgetAlert, CategorySpend, Credentials, CurrentMonthSpend,
    MonthlySpendPoint, NewBudget, NewTransaction, Receipt, TokenResponse, Transaction,
    TransactionFilter, User,
};

/// Multipart field the upload endpoint reads
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
    upload_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            upload_timeout: None,
        }
    }

    /// Receipt parsing can take much longer than ordinary calls
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    // ========== Auth ==========

    pub async fn register(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;
        self.gateway
            .send_json(ApiRequest::post("/auth/register").json(credentials)?)
            .await
    }

    /// Exchange credentials for an access token (form-encoded, OAuth2 style)
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse> {
        credentials.validate()?;
        let form = vec![
            ("username".to_string(), credentials.email.trim().to_string()),
            ("password".to_string(), credentials.password.clone()),
        ];
        self.gateway
            .send_json(ApiRequest::post("/auth/login").form(form))
            .await
    }

    pub async fn current_user(&self) -> Result<User> {
        self.gateway.send_json(ApiRequest::get("/users/me")).await
    }

    // ========== Receipts ==========

    pub async fn upload_receipt(&self, image: &ReceiptImage) -> Result<Receipt> {
        let mut request = ApiRequest::post("/receipts/upload").multipart(FilePart {
            field: UPLOAD_FIELD.to_string(),
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            data: image.data.clone(),
        });
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }
        self.gateway.send_json(request).await
    }

    pub async fn list_receipts(&self, skip: u32, limit: u32) -> Result<Vec<Receipt>> {
        self.gateway
            .send_json(
                ApiRequest::get("/receipts")
                    .query_param("skip", skip)
                    .query_param("limit", limit.max(1)),
            )
            .await
    }

    pub async fn get_receipt(&self, id: &str) -> Result<Receipt> {
        self.gateway
            .send_json(ApiRequest::get(format!("/receipts/{}", id)))
            .await
    }

    // ========== Transactions ==========

    pub async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        self.gateway
            .send_json(ApiRequest::get("/transactions").query(filter.to_query()))
            .await
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Transaction> {
        self.gateway
            .send_json(ApiRequest::get(format!("/transactions/{}", id)))
            .await
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        transaction.validate()?;
        self.gateway
            .send_json(ApiRequest::post("/transactions").json(transaction)?)
            .await
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<()> {
        self.gateway
            .send_empty(ApiRequest::delete(format!("/transactions/{}", id)))
            .await
    }

    // ========== Budgets ==========

    pub async fn list_budgets(&self) -> Result<Vec<Budget>> {
        self.gateway.send_json(ApiRequest::get("/budgets")).await
    }

    /// Create the budget, or replace the limit of the one with this category
    pub async fn upsert_budget(&self, budget: &NewBudget) -> Result<Budget> {
        budget.validate()?;
        let payload = NewBudget {
            category: budget.category.trim().to_string(),
            monthly_limit: budget.monthly_limit,
        };
        self.gateway
            .send_json(ApiRequest::post("/budgets").json(&payload)?)
            .await
    }

    pub async fn delete_budget(&self, id: &str) -> Result<()> {
        self.gateway
            .send_empty(ApiRequest::delete(format!("/budgets/{}", id)))
            .await
    }

    // ========== Analytics ==========

    pub async fn monthly_spend(&self, months: u32) -> Result<Vec<MonthlySpendPoint>> {
        let months = validate_months(months)?;
        self.gateway
            .send_json(ApiRequest::get("/analytics/monthly-spend").query_param("months", months))
            .await
    }

    pub async fn category_breakdown(&self, months: u32) -> Result<Vec<CategorySpend>> {
        let months = validate_months(months)?;
        self.gateway
            .send_json(
                ApiRequest::get("/analytics/category-breakdown").query_param("months", months),
            )
            .await
    }

    pub async fn budget_alerts(&self) -> Result<Vec<BudgetAlert>> {
        self.gateway
            .send_json(ApiRequest::get("/analytics/budget-alerts"))
            .await
    }

    pub async fn current_month_spend(&self) -> Result<CurrentMonthSpend> {
        self.gateway
            .send_json(ApiRequest::get("/analytics/current-month-spend"))
            .await
    }
}

#[async_trait]
impl ReceiptUploader for ApiClient {
    async fn upload_receipt(&self, image: &ReceiptImage) -> Result<Receipt> {
        ApiClient::upload_receipt(self, image).await
    }
}
