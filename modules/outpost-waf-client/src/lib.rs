pub mod error;
pub mod types;

pub use error::{Result, WafError};
pub use types::{WafReport, WafReportEntry};

use std::time::Duration;

/// Thin HTTP client over the WAF fingerprinter collaborator. The fingerprinter itself is out of scope — this crate only
/// models its request/response shape.
pub struct WafClient {
    client: reqwest::Client,
    base_url: String,
}

impl WafClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Ask the fingerprinter to probe `url`. Returns the first entry of the
    /// report — callers treat an empty report as "not detected".
    pub async fn fingerprint(&self, url: &str) -> Result<Option<WafReportEntry>> {
        let resp = self
            .client
            .get(format!("{}/fingerprint", self.base_url))
            .query(&[("url", url)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WafError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let report: WafReport = resp.json().await?;
        Ok(report.report.into_iter().next())
    }
}
