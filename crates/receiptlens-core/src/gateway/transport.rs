//! HTTP transport for the gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;

use super::{ApiRequest, ApiResponse, Method, RequestBody};
use crate::error::{Error, Result};

/// Sends one request and returns the raw response
///
/// Implementations report "no response" as `Error::Transport` and return
/// every received response, whatever its status, as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport against a fixed base URL
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = builder.header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(part) => {
                let file = multipart::Part::bytes(part.data)
                    .file_name(part.file_name)
                    .mime_str(&part.content_type)?;
                builder.multipart(multipart::Form::new().part(part.field, file))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let t = HttpTransport::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(t.base_url(), "http://localhost:8000");
        assert_eq!(t.url_for("/budgets"), "http://localhost:8000/budgets");
        assert_eq!(t.url_for("budgets"), "http://localhost:8000/budgets");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 1 on loopback is reserved and closed
        let t = HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = t.send(ApiRequest::get("/users/me")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
