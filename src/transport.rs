//! Authenticated JSON-over-HTTP transport to the workspace.
//!
//! Every request carries `Authorization: Bearer <token>`. Any non-2xx
//! response becomes [`GenieError::Transport`] with the response body as the
//! message. Nothing is retried here.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::{GenieError, Result};

#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    token: String,
}

impl Transport {
    pub fn new(base_url: &str, token: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.workspace.url,
            config.token(),
            Duration::from_secs(config.polling.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.request(Method::GET, path);
        self.send(req, path).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.request(Method::POST, path).json(body);
        self.send(req, path).await
    }

    /// POST with a per-request timeout replacing the client-wide one, for
    /// calls the server is asked to hold open.
    pub async fn post_with_timeout<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let req = self.request(Method::POST, path).json(body).timeout(timeout);
        self.send(req, path).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T> {
        tracing::debug!(path, "workspace request");
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenieError::Transport {
                status: Some(status.as_u16()),
                url: format!("{}{}", self.base_url, path),
                message: error_detail(&body),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            GenieError::MalformedResponse(format!("{}: {}", path, e))
        })
    }
}

/// Prefer the structured `message` field of an error body, falling back to
/// the raw text.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(|m| match v.get("error_code").and_then(|c| c.as_str()) {
                    Some(code) => format!("{}: {}", code, m),
                    None => m.to_string(),
                })
        })
        .unwrap_or_else(|| body.trim().to_string())
}
