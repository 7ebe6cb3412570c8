//! WAF step: call the external fingerprinter on the
//! publisher's homepage.

use outpost_waf_client::WafClient;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WafResult {
    pub waf_detected: bool,
    /// Empty when not detected.
    pub waf_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WafResult {
    fn not_detected() -> Self {
        Self {
            waf_detected: false,
            waf_type: String::new(),
            error: None,
        }
    }
}

/// Run the WAF step. A subprocess/JSON failure is caught and returned as
/// `{waf_detected:false, waf_type:"", error}`, never propagated.
pub async fn detect(client: &WafClient, homepage_url: &str) -> WafResult {
    match client.fingerprint(homepage_url).await {
        Ok(Some(entry)) if entry.detected => WafResult {
            waf_detected: true,
            waf_type: entry.firewall,
            error: None,
        },
        Ok(_) => WafResult::not_detected(),
        Err(e) => WafResult {
            error: Some(e.to_string()),
            ..WafResult::not_detected()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_detected_has_empty_type_and_no_error() {
        let result = WafResult::not_detected();
        assert!(!result.waf_detected);
        assert_eq!(result.waf_type, "");
        assert!(result.error.is_none());
    }
}
