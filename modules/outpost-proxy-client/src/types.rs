use serde::{Deserialize, Serialize};

/// Request body for the proxy API.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyRequest {
    pub url: String,
    #[serde(rename = "httpResponseBody")]
    pub http_response_body: bool,
}

impl ProxyRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_response_body: true,
        }
    }
}

/// Response shape on success. Extra fields the provider may add are
/// ignored by serde's default behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Base64-encoded raw response body of the fetched page.
    pub body: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
}
