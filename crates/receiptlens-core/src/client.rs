//! High-level client tying session, gateway, cache and pipeline together
//!
//! `FinanceClient` is what the front end talks to. Reads are served from the
//! query cache; every mutation invalidates its query groups once the
//! backend has answered, so the next read reflects the change.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alerts::{budget_statuses, BudgetStatusView};
use crate::api::ApiClient;
use crate::cache::{Mutation, QueryCache, QueryGroup, QueryKey};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gateway::{Gateway, HttpTransport, Transport};
use crate::ingest::{IngestionPipeline, IntervalTicker, ReceiptImage};
use crate::models::{
    Budget, BudgetAlert, CategorySpend, Credentials, CurrentMonthSpend, MonthlySpendPoint,
    NewBudget, NewTransaction, Receipt, Transaction, TransactionFilter, User,
};
use crate::session::{AuthState, SessionStore};

/// Months of history on the dashboard chart
pub const DASHBOARD_MONTHS: u32 = 6;

/// Recent transactions on the dashboard
pub const DASHBOARD_RECENT: u32 = 10;

/// Everything the dashboard shows, fetched together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub current_month: CurrentMonthSpend,
    pub monthly: Vec<MonthlySpendPoint>,
    pub recent: Vec<Transaction>,
}

pub struct FinanceClient {
    session: Arc<SessionStore>,
    api: ApiClient,
    cache: Arc<QueryCache>,
}

impl FinanceClient {
    /// Client over HTTP with the token persisted at `config.token_path`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout)?;
        let session = Arc::new(SessionStore::from_file(&config.token_path));
        Ok(Self::with_parts(
            Arc::new(transport),
            session,
            config.upload_timeout,
        ))
    }

    /// Client over any transport and session store
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        upload_timeout: Duration,
    ) -> Self {
        let gateway = Gateway::with_session(transport, session.clone());
        Self {
            session,
            api: ApiClient::new(gateway).with_upload_timeout(upload_timeout),
            cache: Arc::new(QueryCache::new()),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ========== Session ==========

    /// Resolve the auth state from the persisted token
    pub async fn restore_session(&self) -> Result<AuthState> {
        self.session.restore().await
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<User> {
        let user = self.api.register(credentials).await?;
        info!("Registered {}", user.email);
        Ok(user)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let token = self.api.login(credentials).await?;
        self.session.set_token(&token.access_token).await?;
        self.cache.invalidate_for(Mutation::Login);
        Ok(())
    }

    /// Forget the token and every cached query
    pub async fn logout(&self) -> Result<()> {
        let cleared = self.session.clear_token().await;
        self.cache.invalidate_for(Mutation::Logout);
        cleared
    }

    pub async fn current_user(&self) -> Result<User> {
        self.cache
            .fetch(QueryKey::group(QueryGroup::User), || {
                self.api.current_user()
            })
            .await
    }

    // ========== Receipts ==========

    /// Upload one image through a fresh pipeline
    pub async fn upload_receipt(&self, image: ReceiptImage) -> Result<Receipt> {
        let mut pipeline = IngestionPipeline::new();
        pipeline.select_image(image);
        self.ingest_receipt(&mut pipeline).await
    }

    /// Run `pipeline` against the backend with the standard progress ticker
    pub async fn ingest_receipt(&self, pipeline: &mut IngestionPipeline) -> Result<Receipt> {
        pipeline
            .run(&self.api, &self.cache, IntervalTicker::default())
            .await
    }

    pub async fn list_receipts(&self, skip: u32, limit: u32) -> Result<Vec<Receipt>> {
        let key = QueryKey::new(QueryGroup::Receipts, format!("skip={}&limit={}", skip, limit));
        self.cache
            .fetch(key, || self.api.list_receipts(skip, limit))
            .await
    }

    pub async fn get_receipt(&self, id: &str) -> Result<Receipt> {
        let key = QueryKey::new(QueryGroup::Receipts, format!("id={}", id));
        self.cache.fetch(key, || self.api.get_receipt(id)).await
    }

    // ========== Transactions ==========

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let key = QueryKey::with_query(QueryGroup::Transactions, &filter.to_query());
        self.cache
            .fetch(key, || self.api.list_transactions(filter))
            .await
    }

    pub async fn transaction(&self, id: &str) -> Result<Transaction> {
        let key = QueryKey::new(QueryGroup::Transactions, format!("id={}", id));
        self.cache.fetch(key, || self.api.get_transaction(id)).await
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        let created = self.api.create_transaction(transaction).await?;
        self.cache.invalidate_for(Mutation::CreateTransaction);
        info!("Created transaction {}", created.id);
        Ok(created)
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<()> {
        self.api.delete_transaction(id).await?;
        self.cache.invalidate_for(Mutation::DeleteTransaction);
        info!("Deleted transaction {}", id);
        Ok(())
    }

    // ========== Budgets ==========

    pub async fn budgets(&self) -> Result<Vec<Budget>> {
        self.cache
            .fetch(QueryKey::group(QueryGroup::Budgets), || {
                self.api.list_budgets()
            })
            .await
    }

    pub async fn upsert_budget(&self, budget: &NewBudget) -> Result<Budget> {
        let saved = self.api.upsert_budget(budget).await?;
        self.cache.invalidate_for(Mutation::UpsertBudget);
        info!(
            "Budget for {} set to {:.2}",
            saved.category, saved.monthly_limit
        );
        Ok(saved)
    }

    pub async fn delete_budget(&self, id: &str) -> Result<()> {
        self.api.delete_budget(id).await?;
        self.cache.invalidate_for(Mutation::DeleteBudget);
        info!("Deleted budget {}", id);
        Ok(())
    }

    /// Every budget with its derived status for the current month
    pub async fn budget_statuses(&self) -> Result<Vec<BudgetStatusView>> {
        let (budgets, alerts) = tokio::try_join!(self.budgets(), self.budget_alerts())?;
        Ok(budget_statuses(&budgets, &alerts))
    }

    // ========== Analytics ==========

    pub async fn monthly_spend(&self, months: u32) -> Result<Vec<MonthlySpendPoint>> {
        let key = QueryKey::new(QueryGroup::Analytics, format!("monthly-spend?months={}", months));
        self.cache
            .fetch(key, || self.api.monthly_spend(months))
            .await
    }

    pub async fn category_breakdown(&self, months: u32) -> Result<Vec<CategorySpend>> {
        let key = QueryKey::new(
            QueryGroup::Analytics,
            format!("category-breakdown?months={}", months),
        );
        self.cache
            .fetch(key, || self.api.category_breakdown(months))
            .await
    }

    pub async fn budget_alerts(&self) -> Result<Vec<BudgetAlert>> {
        self.cache
            .fetch(QueryKey::new(QueryGroup::Analytics, "budget-alerts"), || {
                self.api.budget_alerts()
            })
            .await
    }

    pub async fn current_month_spend(&self) -> Result<CurrentMonthSpend> {
        self.cache
            .fetch(
                QueryKey::new(QueryGroup::Analytics, "current-month-spend"),
                || self.api.current_month_spend(),
            )
            .await
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let recent = TransactionFilter::recent(DASHBOARD_RECENT);
        let (current_month, monthly, recent) = tokio::try_join!(
            self.current_month_spend(),
            self.monthly_spend(DASHBOARD_MONTHS),
            self.transactions(&recent),
        )?;
        Ok(Dashboard {
            current_month,
            monthly,
            recent,
        })
    }
}
