//! Pure client for the proxy-API fetch strategy.

pub mod error;
pub mod types;

pub use error::{ProxyError, Result};
pub use types::{ProxyRequest, ProxyResponse};

use base64::Engine;
use std::time::Duration;

pub struct ProxyApiClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    key: String,
}

impl ProxyApiClient {
    pub fn new(base_url: impl Into<String>, user: impl Into<String>, key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: base_url.into(),
            user: user.into(),
            key: key.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        self
    }

    /// Fetch a URL through the proxy. Returns the decoded HTML body.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let body = ProxyRequest::new(url);

        let resp = self
            .client
            .post(&self.base_url)
            .basic_auth(&self.user, Some(&self.key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProxyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ProxyResponse = resp.json().await?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(parsed.body.as_bytes())
            .map_err(|e| ProxyError::Base64(e.to_string()))?;

        String::from_utf8(decoded).map_err(|e| ProxyError::Base64(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_request_sets_http_response_body() {
        let req = ProxyRequest::new("https://example.com");
        assert!(req.http_response_body);
        assert_eq!(req.url, "https://example.com");
    }
}
