//! ReceiptLens Core Library
//!
//! Client-side core for the ReceiptLens personal finance service:
//! - Session store with a persisted access token and tri-state auth gate
//! - Request gateway with bearer-token and session-expiry middleware
//! - Receipt ingestion pipeline with simulated upload progress
//! - Query cache with group invalidation driven by mutations
//! - Budget alert engine deriving per-budget status
//!
//! The backend owns all durable data. This crate authenticates, uploads
//! receipt images, caches query results and keeps them consistent after
//! writes.

pub mod alerts;
pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod models;
pub mod session;

/// Test utilities including a mock ReceiptLens backend
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alerts::{
    budget_statuses, evaluate, status_for, BudgetEvaluation, BudgetStatus, BudgetStatusView,
    Indicator, NEAR_LIMIT_PERCENT,
};
pub use api::ApiClient;
pub use cache::{Mutation, QueryCache, QueryGroup, QueryKey};
pub use client::{Dashboard, FinanceClient};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use gateway::{
    ApiRequest, ApiResponse, Gateway, HttpTransport, Method, Middleware, RequestBody, Transport,
};
pub use ingest::{
    IngestSnapshot, IngestState, IngestionPipeline, IntervalTicker, ReceiptImage,
    ReceiptUploader, Ticker,
};
pub use models::*;
pub use session::{AuthState, FileTokenStore, MemoryTokenStore, SessionStore, TokenStore};
