//! HTTP client used to exercise the target under test

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use super::message::{HttpRequest, HttpResponse};
use crate::common::{Error, Result};

/// Sends a resolved request and returns the raw response
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// HTTP client implementation using reqwest
pub struct ReqwestClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Create a client with a per-request timeout
    ///
    /// Redirects are not followed: a contract test asserts on the response the
    /// target actually sent.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hunit/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, error: reqwest::Error, url: &str) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                after: self.timeout,
                pending: url.to_string(),
            }
        } else {
            Error::Transport(format!("{}: {}", url, error))
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::Transport(format!("invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.entity.is_empty() {
            builder = builder.body(request.entity.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(e, &request.url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let entity = response
            .text()
            .await
            .map_err(|e| self.map_error(e, &request.url))?;

        Ok(HttpResponse {
            status,
            headers,
            entity,
        })
    }
}
