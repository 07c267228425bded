//! Request gateway: every outbound backend call goes through here
//!
//! The gateway is an ordered middleware pipeline wrapped around a
//! transport:
//!
//! 1. Each middleware's `on_request` runs in order (bearer token, logging)
//! 2. The transport sends the request
//! 3. Non-2xx responses are classified into `Error::Unauthorized` (401) or
//!    `Error::Backend` (other 4xx/5xx, with the parsed `detail`)
//! 4. Each middleware's `on_response` runs in order over the outcome
//!    (session expiry on 401, logging)
//!
//! Nothing is retried. Hooks are plain trait objects, so each one can be
//! tested without a transport, and the transport can be swapped for an
//! in-process fake.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::SessionStore;

pub mod middleware;
mod transport;

pub use middleware::{BearerToken, ExpireSessionOnUnauthorized, Middleware, TraceRequests};
pub use transport::{HttpTransport, Transport};

/// HTTP methods the backend surface uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file attached to a multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    Multipart(FilePart),
}

/// Transport-independent description of one backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/transactions`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Overrides the transport's default timeout
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn query_param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Replaces any existing header with the same (case-insensitive) name
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn multipart(mut self, part: FilePart) -> Self {
        self.body = RequestBody::Multipart(part);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Method and path, for logging and response hooks
    pub fn line(&self) -> RequestLine {
        RequestLine {
            method: self.method,
            path: self.path.clone(),
        }
    }
}

/// What response hooks know about the request they are answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
}

impl std::fmt::Display for RequestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Raw backend response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Structured error detail from the body, if the backend sent one
    pub fn detail(&self) -> Option<String> {
        parse_detail(&self.body)
    }
}

/// Extract a human-readable `detail` from an error body
///
/// Accepts `{"detail": "message"}` and the validation form
/// `{"detail": [{"loc": ["body", "email"], "msg": "..."}]}`, which is
/// rendered one `loc.path - msg` per line. Anything else is `None`.
pub fn parse_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg")?.as_str()?;
                    let loc = item
                        .get("loc")
                        .and_then(|l| l.as_array())
                        .map(|parts| {
                            parts
                                .iter()
                                .map(|p| match p {
                                    serde_json::Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                })
                                .collect::<Vec<_>>()
                                .join(".")
                        })
                        .unwrap_or_default();
                    Some(if loc.is_empty() {
                        msg.to_string()
                    } else {
                        format!("{} - {}", loc, msg)
                    })
                })
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        _ => None,
    }
}

/// Turn non-2xx responses into errors
fn classify(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let detail = response.detail();
    if response.status == 401 {
        Err(Error::Unauthorized { detail })
    } else {
        Err(Error::Backend {
            status: response.status,
            detail,
        })
    }
}

/// Middleware pipeline over a transport
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Gateway {
    /// Bare gateway with no middleware
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            middleware: Vec::new(),
        }
    }

    /// Logging, bearer token, and session expiry on 401
    pub fn with_session(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self::new(transport)
            .with(TraceRequests)
            .with(BearerToken::new(session.clone()))
            .with(ExpireSessionOnUnauthorized::new(session))
    }

    /// Append a middleware; it runs after those already registered
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let line = request.line();

        let mut prepared = Ok(request);
        for m in &self.middleware {
            prepared = match prepared {
                Ok(request) => m.on_request(request).await,
                Err(e) => Err(e),
            };
        }

        let mut result = match prepared {
            Ok(request) => match self.transport.send(request).await {
                Ok(response) => classify(response),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        for m in &self.middleware {
            result = m.on_response(&line, result).await;
        }
        result
    }

    /// Send and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Send and ignore the body (e.g. 204 No Content)
    pub async fn send_empty(&self, request: ApiRequest) -> Result<()> {
        self.send(request).await.map(|_| ())
    }
}
