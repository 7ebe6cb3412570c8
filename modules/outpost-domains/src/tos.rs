//! ToS discovery and ToS evaluation.
//!
//! Both steps treat their LLM collaborator as an opaque JSON-returning
//! service: a failure is caught here and surfaces as an `error`
//! field, never an escape that would fail the job.

use ai_client::Claude;
use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// The eight ToS activities scored by the evaluation step.
pub const TOS_ACTIVITIES: &[&str] = &[
    "scraping",
    "ai_training",
    "manual_use",
    "archiving_caching",
    "tdm",
    "api_rss",
    "redistribution",
    "ugc",
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnchorLink {
    pub href: String,
    pub visible_text: String,
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").unwrap())
}

/// Parse anchor tags from the homepage, resolving relative `href`s against
/// it.
pub fn extract_anchors(html: &str, base_url: &Url) -> Vec<AnchorLink> {
    let document = Html::parse_document(html);
    document
        .select(anchor_selector())
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let resolved = base_url.join(href).ok()?;
            let visible_text = el.text().collect::<String>().trim().to_string();
            Some(AnchorLink {
                href: resolved.to_string(),
                visible_text,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct TosDiscoveryLlmResponse {
    terms_of_service_url: Option<String>,
    confidence_score: f64,
    notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TosDiscoveryResult {
    pub tos_url: Option<String>,
    pub confidence: f64,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const DISCOVERY_SYSTEM_PROMPT: &str = "You are given every anchor tag on a publisher's homepage, \
    as {href, visible_text} pairs. Identify the single canonical Terms of Service URL. \
    Exclude privacy policy and cookie policy pages. If no ToS link exists, return null.";

/// Run ToS discovery.
pub async fn discover(ai: &Claude, homepage_url: &str, anchors: &[AnchorLink]) -> TosDiscoveryResult {
    let user_prompt = serde_json::json!({
        "homepage_url": homepage_url,
        "anchors": anchors,
    })
    .to_string();

    match ai
        .extract::<TosDiscoveryLlmResponse>(DISCOVERY_SYSTEM_PROMPT, user_prompt)
        .await
    {
        Ok(resp) => TosDiscoveryResult {
            tos_url: resp.terms_of_service_url,
            confidence: resp.confidence_score.clamp(0.0, 1.0),
            notes: resp.notes,
            error: None,
        },
        Err(e) => TosDiscoveryResult {
            tos_url: None,
            confidence: 0.0,
            notes: None,
            error: Some(e.to_string()),
        },
    }
}

// ---------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TosPermission {
    ExplicitlyPermitted,
    ExplicitlyProhibited,
    ConditionalAmbiguous,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TosPermissionEntry {
    pub activity: String,
    pub permission: TosPermission,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct TosEvaluationLlmResponse {
    permissions: Vec<TosPermissionEntry>,
    territorial_exceptions: Option<String>,
    arbitration_clauses: Option<String>,
    document_type: Option<String>,
    confidence_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TosEvaluationResult {
    pub permissions: Vec<TosPermissionEntry>,
    pub document_type: Option<String>,
    pub confidence_score: f64,
    pub territorial_exceptions: Option<String>,
    pub arbitration_clauses: Option<String>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const EVALUATION_SYSTEM_PROMPT: &str = "You are given the text of a publisher's Terms of Service \
    document. Score each of the eight listed activities as explicitly_permitted, \
    explicitly_prohibited, or conditional_ambiguous, with a short note, and summarize any \
    territorial exceptions or arbitration clauses.";

/// Run ToS evaluation over a fetched ToS document.
pub async fn evaluate(ai: &Claude, tos_document_text: &str) -> TosEvaluationResult {
    let user_prompt = serde_json::json!({
        "activities": TOS_ACTIVITIES,
        "document_text": tos_document_text,
    })
    .to_string();

    match ai
        .extract::<TosEvaluationLlmResponse>(EVALUATION_SYSTEM_PROMPT, user_prompt)
        .await
    {
        Ok(resp) => TosEvaluationResult {
            permissions: resp.permissions,
            document_type: resp.document_type,
            confidence_score: resp.confidence_score.clamp(0.0, 1.0),
            territorial_exceptions: resp.territorial_exceptions,
            arbitration_clauses: resp.arbitration_clauses,
            skipped: false,
            reason: None,
            error: None,
        },
        Err(e) => TosEvaluationResult {
            permissions: Vec::new(),
            document_type: None,
            confidence_score: 0.0,
            territorial_exceptions: None,
            arbitration_clauses: None,
            skipped: false,
            reason: None,
            error: Some(e.to_string()),
        },
    }
}

/// `{skipped:true, reason}` when discovery found no ToS URL.
pub fn skipped(reason: impl Into<String>) -> TosEvaluationResult {
    TosEvaluationResult {
        permissions: Vec::new(),
        document_type: None,
        confidence_score: 0.0,
        territorial_exceptions: None,
        arbitration_clauses: None,
        skipped: true,
        reason: Some(reason.into()),
        error: None,
    }
}

/// Merge discovery and evaluation into the single `tos_result` job field by
/// key union; evaluation wins on collision. The merge is shallow — nested
/// permission arrays are not deep-merged, evaluation's array simply replaces
/// any same-named key.
pub fn merge(discovery: &TosDiscoveryResult, evaluation: &TosEvaluationResult) -> Value {
    let mut merged = match serde_json::to_value(discovery) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Ok(Value::Object(eval_map)) = serde_json::to_value(evaluation) {
        for (key, value) in eval_map {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_anchors_and_resolves_relative_hrefs() {
        let html = r#"<html><body><a href="/terms">Terms</a><a href="https://other.com/x">X</a></body></html>"#;
        let base = Url::parse("https://example.com/").unwrap();
        let anchors = extract_anchors(html, &base);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].href, "https://example.com/terms");
        assert_eq!(anchors[0].visible_text, "Terms");
    }

    #[test]
    fn skipped_result_carries_reason_and_no_permissions() {
        let result = skipped("no ToS URL discovered");
        assert!(result.skipped);
        assert_eq!(result.reason.as_deref(), Some("no ToS URL discovered"));
        assert!(result.permissions.is_empty());
    }

    #[test]
    fn merge_is_key_union_with_evaluation_winning_on_collision() {
        let discovery = TosDiscoveryResult {
            tos_url: Some("https://example.com/terms".to_string()),
            confidence: 0.9,
            notes: Some("found in footer".to_string()),
            error: None,
        };
        let evaluation = TosEvaluationResult {
            permissions: vec![TosPermissionEntry {
                activity: "scraping".to_string(),
                permission: TosPermission::ExplicitlyProhibited,
                notes: None,
            }],
            document_type: Some("terms_of_service".to_string()),
            confidence_score: 0.8,
            territorial_exceptions: None,
            arbitration_clauses: None,
            skipped: false,
            reason: None,
            error: None,
        };

        let merged = merge(&discovery, &evaluation);
        assert_eq!(merged["tos_url"], "https://example.com/terms");
        assert_eq!(merged["permissions"][0]["activity"], "scraping");
        // `confidence` from discovery survives; evaluation has no same-named key.
        assert_eq!(merged["confidence"], 0.9);
        assert_eq!(merged["confidence_score"], 0.8);
    }
}
