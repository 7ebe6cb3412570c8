//! Metadata profile step: summarize the article
//! extraction result via an LLM collaborator.

use ai_client::Claude;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct MetadataProfileLlmResponse {
    summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetadataProfileResult {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are given the structured metadata extracted from a news article \
    (JSON-LD, OpenGraph, microdata, Twitter Cards fields). Write a two-to-three sentence summary \
    of the article and publisher suitable for an editorial dashboard.";

/// Run the metadata profile step. A collaborator failure returns
/// `{summary:"", error}` rather than aborting the job.
pub async fn profile(ai: &Claude, extraction: &Value) -> MetadataProfileResult {
    let user_prompt = extraction.to_string();

    match ai
        .extract::<MetadataProfileLlmResponse>(SYSTEM_PROMPT, user_prompt)
        .await
    {
        Ok(resp) => MetadataProfileResult {
            summary: resp.summary,
            error: None,
        },
        Err(e) => MetadataProfileResult {
            summary: String::new(),
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_without_error_field_when_absent() {
        let result = MetadataProfileResult {
            summary: "An article about local news.".to_string(),
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(!value.as_object().unwrap().contains_key("error"));
    }
}
