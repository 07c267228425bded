//! Request/response hooks applied by the gateway

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ApiRequest, ApiResponse, RequestLine};
use crate::error::{Error, Result};
use crate::session::SessionStore;

/// One stage of the gateway pipeline
///
/// Both hooks default to pass-through, so a middleware only implements the
/// side it cares about.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short identifier for diagnostics
    fn name(&self) -> &str;

    async fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        Ok(request)
    }

    async fn on_response(
        &self,
        _request: &RequestLine,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        outcome
    }
}

/// Adds `Authorization: Bearer <token>` when a session token exists
pub struct BearerToken {
    session: Arc<SessionStore>,
}

impl BearerToken {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Middleware for BearerToken {
    fn name(&self) -> &str {
        "bearer_token"
    }

    async fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        match self.session.get_token().await? {
            Some(token) => Ok(request.header("Authorization", format!("Bearer {}", token))),
            None => Ok(request),
        }
    }
}

/// Clears the session token when the backend answers 401
///
/// The error still propagates; the caller sees the rejection after the
/// session is already gone, so the next render lands on the login view.
pub struct ExpireSessionOnUnauthorized {
    session: Arc<SessionStore>,
}

impl ExpireSessionOnUnauthorized {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Middleware for ExpireSessionOnUnauthorized {
    fn name(&self) -> &str {
        "expire_session"
    }

    async fn on_response(
        &self,
        request: &RequestLine,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        if let Err(Error::Unauthorized { .. }) = &outcome {
            info!("Unauthorized response to {}, clearing session", request);
            if let Err(e) = self.session.clear_token().await {
                warn!("Failed to clear session token: {}", e);
            }
        }
        outcome
    }
}

/// Logs every request and its outcome
pub struct TraceRequests;

#[async_trait]
impl Middleware for TraceRequests {
    fn name(&self) -> &str {
        "trace"
    }

    async fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        debug!(method = %request.method, path = %request.path, "Sending request");
        Ok(request)
    }

    async fn on_response(
        &self,
        request: &RequestLine,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        match &outcome {
            Ok(response) => debug!(
                status = response.status,
                bytes = response.body.len(),
                "{} succeeded",
                request
            ),
            Err(e) => warn!("{} failed: {}", request, e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Method;

    fn line() -> RequestLine {
        RequestLine {
            method: Method::Get,
            path: "/budgets".into(),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_without_session() {
        let session = Arc::new(SessionStore::in_memory());
        let mw = BearerToken::new(session);

        let req = mw.on_request(ApiRequest::get("/budgets")).await.unwrap();
        assert!(req.header_value("Authorization").is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_with_session() {
        let session = Arc::new(SessionStore::in_memory());
        session.set_token("abc").await.unwrap();
        let mw = BearerToken::new(session);

        let req = mw.on_request(ApiRequest::get("/budgets")).await.unwrap();
        assert_eq!(req.header_value("authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_expire_session_only_on_unauthorized() {
        let session = Arc::new(SessionStore::in_memory());
        session.set_token("abc").await.unwrap();
        let mw = ExpireSessionOnUnauthorized::new(session.clone());

        // Other failures leave the session alone
        let outcome = Err(Error::Backend {
            status: 500,
            detail: None,
        });
        assert!(mw.on_response(&line(), outcome).await.is_err());
        assert_eq!(session.get_token().await.unwrap().as_deref(), Some("abc"));

        let ok = mw
            .on_response(&line(), Ok(ApiResponse::new(200, "[]")))
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
        assert!(session.get_token().await.unwrap().is_some());

        let outcome = Err(Error::Unauthorized { detail: None });
        let err = mw.on_response(&line(), outcome).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(session.get_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trace_is_pass_through() {
        let req = TraceRequests
            .on_request(ApiRequest::post("/budgets"))
            .await
            .unwrap();
        assert_eq!(req.path, "/budgets");

        let err = TraceRequests
            .on_response(&line(), Err(Error::Transport("down".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
