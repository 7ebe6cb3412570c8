//! Strategy A: a direct fetcher that impersonates a modern browser.

use async_trait::async_trait;
use outpost_common::FetchResult;
use std::time::Duration;

use crate::{FetchError, FetchOutcome, FetchStrategy};

const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Lowercased body/status signals that indicate a WAF intercepted the
/// request rather than the origin serving real content.
const WAF_BODY_SIGNATURES: &[&str] = &[
    "checking your browser",
    "cloudflare",
    "access denied",
    "just a moment",
    "cf-browser-verification",
    "ray id",
];

pub struct DirectStrategy {
    client: reqwest::Client,
}

impl DirectStrategy {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    fn looks_like_waf_block(status: reqwest::StatusCode, body: &str) -> bool {
        if status == reqwest::StatusCode::FORBIDDEN {
            return true;
        }
        if status.is_success() {
            let lowered = body.to_lowercase();
            return WAF_BODY_SIGNATURES.iter().any(|sig| lowered.contains(sig));
        }
        false
    }
}

#[async_trait]
impl FetchStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let err = |cause: String| FetchError {
            strategy: self.name().to_string(),
            cause,
        };

        let response = self
            .client
            .get(url)
            .header("User-Agent", CHROME_USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| err(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| err(e.to_string()))?;

        if Self::looks_like_waf_block(status, &body) {
            return Err(err(format!("WAF block detected (status {status})")));
        }

        if !status.is_success() {
            return Err(err(format!("HTTP {status}")));
        }

        Ok(FetchResult {
            body,
            status: status.as_u16(),
            strategy: self.name().to_string(),
            final_url,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_waf_signature_in_2xx_body() {
        assert!(DirectStrategy::looks_like_waf_block(
            reqwest::StatusCode::OK,
            "Please wait... Checking your browser before accessing example.com"
        ));
        assert!(DirectStrategy::looks_like_waf_block(
            reqwest::StatusCode::OK,
            "<title>Just a moment...</title>"
        ));
    }

    #[test]
    fn forbidden_is_always_a_block() {
        assert!(DirectStrategy::looks_like_waf_block(
            reqwest::StatusCode::FORBIDDEN,
            "anything at all"
        ));
    }

    #[test]
    fn clean_2xx_body_is_not_a_block() {
        assert!(!DirectStrategy::looks_like_waf_block(
            reqwest::StatusCode::OK,
            "<html><body>Welcome to the site</body></html>"
        ));
    }
}
