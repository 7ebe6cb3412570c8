//! Paywall Classifier.

use outpost_common::PaywallStatus;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOGIN_WALL_PHRASES: &[&str] = &[
    "subscribe to continue reading",
    "sign in to read",
    "create an account to continue",
    "already a subscriber?",
    "subscription required",
    "members only",
];

const PAYWALL_CSS_CLASSES: &[&str] = &[
    "paywall",
    "subscriber-only",
    "premium-content",
    "gated-content",
    "meter-",
    "regwall",
];

const METER_PHRASES: &[&str] = &["articles remaining", "free articles", "monthly limit", "article limit"];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaywallResult {
    pub paywall_status: PaywallStatus,
    pub signals: Vec<String>,
    pub schema_accessible: Option<bool>,
}

/// `true`-like: boolean true, or the strings "true", "yes", "1".
fn is_true_like(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn schema_accessible_from(jsonld_fields: &Value) -> Option<bool> {
    if let Some(v) = jsonld_fields.get("isAccessibleForFree") {
        return Some(is_true_like(v));
    }

    if let Some(has_part) = jsonld_fields.get("hasPart") {
        let children: Vec<&Value> = match has_part {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![has_part],
            _ => Vec::new(),
        };
        for child in children {
            if let Some(v) = child.get("isAccessibleForFree") {
                return Some(is_true_like(v));
            }
        }
    }

    None
}

/// Classify paywall state for an article: schema first, HTML
/// heuristics only when schema is silent.
pub fn classify(html: &str, jsonld_fields: Option<&Value>) -> PaywallResult {
    if let Some(fields) = jsonld_fields {
        if let Some(accessible) = schema_accessible_from(fields) {
            let status = if accessible {
                PaywallStatus::Free
            } else {
                PaywallStatus::Paywalled
            };
            return PaywallResult {
                paywall_status: status,
                signals: Vec::new(),
                schema_accessible: Some(accessible),
            };
        }
    }

    let lower = html.to_lowercase();
    let mut signals = Vec::new();

    let login_wall_hit = LOGIN_WALL_PHRASES.iter().any(|p| {
        let hit = lower.contains(p);
        if hit {
            signals.push(format!("login_wall:{p}"));
        }
        hit
    });
    let paywall_class_hit = PAYWALL_CSS_CLASSES.iter().any(|p| {
        let hit = lower.contains(p);
        if hit {
            signals.push(format!("paywall_class:{p}"));
        }
        hit
    });
    let meter_hit = METER_PHRASES.iter().any(|p| {
        let hit = lower.contains(p);
        if hit {
            signals.push(format!("meter:{p}"));
        }
        hit
    });

    let status = if meter_hit {
        PaywallStatus::Metered
    } else if login_wall_hit && paywall_class_hit {
        PaywallStatus::Paywalled
    } else if signals.is_empty() {
        PaywallStatus::Free
    } else {
        PaywallStatus::Unknown
    };

    PaywallResult {
        paywall_status: status,
        signals,
        schema_accessible: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_false_is_paywalled() {
        let fields = json!({"isAccessibleForFree": false});
        let result = classify("<html></html>", Some(&fields));
        assert_eq!(result.paywall_status, PaywallStatus::Paywalled);
        assert_eq!(result.schema_accessible, Some(false));
    }

    #[test]
    fn schema_true_like_string_is_free() {
        let fields = json!({"isAccessibleForFree": "True"});
        let result = classify("<html></html>", Some(&fields));
        assert_eq!(result.paywall_status, PaywallStatus::Free);
    }

    #[test]
    fn has_part_fallback_checked_when_top_level_silent() {
        let fields = json!({"hasPart": [{"isAccessibleForFree": false}]});
        let result = classify("<html></html>", Some(&fields));
        assert_eq!(result.paywall_status, PaywallStatus::Paywalled);
    }

    #[test]
    fn meter_phrase_wins_regardless_of_other_signals() {
        let html = "<div class=\"paywall\">subscribe to continue reading, 3 articles remaining</div>";
        let result = classify(html, None);
        assert_eq!(result.paywall_status, PaywallStatus::Metered);
    }

    #[test]
    fn login_wall_and_paywall_class_together_are_paywalled() {
        let html = "<div class=\"paywall\">subscribe to continue reading</div>";
        let result = classify(html, None);
        assert_eq!(result.paywall_status, PaywallStatus::Paywalled);
    }

    #[test]
    fn clean_html_is_free() {
        let result = classify("<html><body>just an article</body></html>", None);
        assert_eq!(result.paywall_status, PaywallStatus::Free);
        assert!(result.signals.is_empty());
    }

    #[test]
    fn single_signal_without_both_classes_is_unknown() {
        let html = "<div class=\"premium-content\">ordinary text</div>";
        let result = classify(html, None);
        assert_eq!(result.paywall_status, PaywallStatus::Unknown);
    }
}
