//! Structured-Data Scorer: organization identity
//! from JSON-LD with a microdata fallback.

use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

const ORG_TYPES: &[&str] = &[
    "Organization",
    "NewsMediaOrganization",
    "Corporation",
    "LocalBusiness",
    "NGO",
    "EducationalOrganization",
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrganizationCandidate {
    pub name: Option<String>,
    pub r#type: Option<String>,
    pub url: Option<String>,
    pub id: Option<String>,
    pub logo: Option<String>,
    #[serde(default)]
    pub same_as: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScorerResult {
    pub found: bool,
    pub source: Option<String>,
    pub score: i32,
    pub organization: Option<OrganizationCandidate>,
    pub candidate_count: usize,
}

fn jsonld_script_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap())
}

/// Extract every top-level JSON-LD item from `<script type="application/ld+json">`
/// blocks, expanding `@graph` arrays into their member nodes.
fn flatten_jsonld_nodes(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let mut nodes = Vec::new();

    for script in document.select(jsonld_script_selector()) {
        let text: String = script.text().collect();
        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        collect_nodes(&parsed, &mut nodes);
    }

    nodes
}

fn collect_nodes(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(graph)) = map.get("@graph") {
                for node in graph {
                    collect_nodes(node, out);
                }
            }
            if map.contains_key("@type") {
                out.push(value.clone());
            }
        }
        _ => {}
    }
}

fn type_strings(node: &Value) -> Vec<String> {
    match node.get("@type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn type_matches(node: &Value, candidates: &[&str]) -> bool {
    type_strings(node).iter().any(|t| {
        let bare = t.rsplit('/').next().unwrap_or(t);
        candidates.iter().any(|c| *c == bare)
    })
}

fn string_field(node: &Value, field: &str) -> Option<String> {
    node.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn id_or_url_matches(field: &Value, target: &str) -> bool {
    match field {
        Value::String(s) => strip_trailing_slash(s) == strip_trailing_slash(target),
        Value::Object(map) => {
            let id = map.get("@id").and_then(|v| v.as_str());
            let url = map.get("url").and_then(|v| v.as_str());
            id.map(|s| strip_trailing_slash(s) == strip_trailing_slash(target))
                .unwrap_or(false)
                || url
                    .map(|s| strip_trailing_slash(s) == strip_trailing_slash(target))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn strip_trailing_slash(s: &str) -> &str {
    s.trim_end_matches('/')
}

fn same_as_list(node: &Value) -> Vec<String> {
    match node.get("sameAs") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    }
}

struct Scored {
    node: Value,
    score: i32,
    index: usize,
}

/// Run the full JSON-LD scoring pass.
pub fn score_jsonld(html: &str, homepage_url: &str) -> ScorerResult {
    let nodes = flatten_jsonld_nodes(html);
    let candidates: Vec<&Value> = nodes.iter().filter(|n| type_matches(n, ORG_TYPES)).collect();

    if candidates.is_empty() {
        return ScorerResult {
            found: false,
            source: None,
            score: 0,
            organization: None,
            candidate_count: 0,
        };
    }

    let mut scored: Vec<Scored> = candidates
        .iter()
        .enumerate()
        .map(|(index, node)| Scored {
            node: (*node).clone(),
            score: score_candidate(node, homepage_url, &nodes),
            index,
        })
        .filter(|s| {
            let has_url = s.node.get("url").and_then(|v| v.as_str()).is_some();
            let has_id = s.node.get("@id").and_then(|v| v.as_str()).is_some();
            s.score != 0 || has_url || has_id
        })
        .collect();

    if scored.is_empty() {
        return ScorerResult {
            found: false,
            source: None,
            score: 0,
            organization: None,
            candidate_count: candidates.len(),
        };
    }

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| url_priority(a, homepage_url).cmp(&url_priority(b, homepage_url)))
            .then_with(|| id_priority(a).cmp(&id_priority(b)))
            .then_with(|| a.index.cmp(&b.index))
    });

    let winner = &scored[0];
    let organization = OrganizationCandidate {
        name: string_field(&winner.node, "name"),
        r#type: type_strings(&winner.node).into_iter().next(),
        url: string_field(&winner.node, "url"),
        id: string_field(&winner.node, "@id"),
        logo: winner
            .node
            .get("logo")
            .and_then(|v| v.as_str().map(String::from).or_else(|| v.get("url").and_then(|u| u.as_str()).map(String::from))),
        same_as: same_as_list(&winner.node),
    };

    ScorerResult {
        found: true,
        source: Some("json-ld".to_string()),
        score: winner.score,
        organization: Some(organization),
        candidate_count: candidates.len(),
    }
}

fn url_priority(s: &Scored, homepage: &str) -> u8 {
    let matches = s
        .node
        .get("url")
        .and_then(|v| v.as_str())
        .map(|u| strip_trailing_slash(u) == strip_trailing_slash(homepage))
        .unwrap_or(false);
    if matches {
        0
    } else {
        1
    }
}

fn id_priority(s: &Scored) -> u8 {
    let id = s.node.get("@id").and_then(|v| v.as_str()).unwrap_or("");
    if id.contains("#organization") || id.contains("#publisher") {
        0
    } else {
        1
    }
}

fn score_candidate(node: &Value, homepage_url: &str, all_nodes: &[Value]) -> i32 {
    let mut score = 0;

    if let Some(id) = node.get("@id").and_then(|v| v.as_str()) {
        if strip_trailing_slash(id) == strip_trailing_slash(homepage_url) {
            score += 4;
        }
        if id.contains("#organization") || id.contains("#publisher") || id.contains("#brand") {
            score += 2;
        }
    }
    if let Some(url) = node.get("url").and_then(|v| v.as_str()) {
        if strip_trailing_slash(url) == strip_trailing_slash(homepage_url) {
            score += 3;
        }
    }
    if type_matches(node, &["NewsMediaOrganization"]) {
        score += 3;
    }

    let referenced = all_nodes.iter().any(|other| {
        ["publisher", "author", "isPartOf"].iter().any(|field| {
            other
                .get(field)
                .map(|v| id_or_url_matches(v, node.get("@id").and_then(|v| v.as_str()).unwrap_or("")))
                .unwrap_or(false)
        })
    });
    if referenced {
        score += 2;
    }

    if node.get("logo").is_some() {
        score += 1;
    }
    if !same_as_list(node).is_empty() {
        score += 1;
    }
    if node.get("contactPoint").is_some() || node.get("address").is_some() {
        score += 1;
    }

    score
}

fn microdata_org_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse("[itemscope][itemtype*=\"Organization\"], [itemscope][itemtype*=\"schema.org\"]").unwrap()
    })
}

/// Microdata fallback, only run when JSON-LD found nothing.
pub fn score_microdata(html: &str, homepage_url: &str) -> ScorerResult {
    let document = Html::parse_document(html);
    let mut best: Option<(i32, OrganizationCandidate)> = None;
    let mut count = 0;

    for el in document.select(microdata_org_selector()) {
        let itemtype = el.value().attr("itemtype").unwrap_or("");
        if !ORG_TYPES.iter().any(|t| itemtype.ends_with(t)) {
            continue;
        }
        count += 1;

        let itemid = el.value().attr("itemid");
        let mut score = 0;
        let url = find_itemprop(&el, "url");
        let name = find_itemprop(&el, "name");
        let logo = find_itemprop(&el, "logo");
        let same_as = find_all_itemprop(&el, "sameAs");

        if url.as_deref().map(|u| strip_trailing_slash(u) == strip_trailing_slash(homepage_url)).unwrap_or(false) {
            score += 3;
        }
        if itemid.map(|i| strip_trailing_slash(i) == strip_trailing_slash(homepage_url)).unwrap_or(false) {
            score += 2;
        }
        if logo.is_some() {
            score += 1;
        }
        if !same_as.is_empty() {
            score += 1;
        }
        if is_publisher_of_matching_container(&el, name.as_deref()) {
            score += 2;
        }

        let candidate = OrganizationCandidate {
            name,
            r#type: Some(itemtype.to_string()),
            url,
            id: itemid.map(String::from),
            logo,
            same_as,
        };

        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, candidate));
        }
    }

    match best {
        Some((score, organization)) => ScorerResult {
            found: true,
            source: Some("microdata".to_string()),
            score,
            organization: Some(organization),
            candidate_count: count,
        },
        None => ScorerResult {
            found: false,
            source: None,
            score: 0,
            organization: None,
            candidate_count: count,
        },
    }
}

fn find_itemprop(el: &scraper::ElementRef, prop: &str) -> Option<String> {
    let selector = Selector::parse(&format!("[itemprop=\"{prop}\"]")).ok()?;
    let found = el.select(&selector).next()?;
    found
        .value()
        .attr("content")
        .or_else(|| found.value().attr("href"))
        .or_else(|| found.value().attr("src"))
        .map(String::from)
        .or_else(|| Some(found.text().collect::<String>()))
}

fn find_all_itemprop(el: &scraper::ElementRef, prop: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(&format!("[itemprop=\"{prop}\"]")) else {
        return Vec::new();
    };
    el.select(&selector)
        .filter_map(|e| e.value().attr("href").map(String::from))
        .collect()
}

/// True when `el` is itself marked `itemprop="publisher"` and its nearest
/// enclosing `WebPage`/`WebSite` ancestor declares the same `name`.
fn is_publisher_of_matching_container(el: &scraper::ElementRef, name: Option<&str>) -> bool {
    let Some(name) = name else { return false };
    if el.value().attr("itemprop") != Some("publisher") {
        return false;
    }
    let Some(container) = enclosing_webpage_or_website(el) else {
        return false;
    };
    find_itemprop(&container, "name").as_deref() == Some(name)
}

/// Walk up the tree looking for the nearest `itemscope` ancestor whose
/// `itemtype` names `WebPage` or `WebSite`.
fn enclosing_webpage_or_website<'a>(el: &scraper::ElementRef<'a>) -> Option<scraper::ElementRef<'a>> {
    let mut current = el.parent();
    while let Some(node) = current {
        if let Some(ancestor) = scraper::ElementRef::wrap(node) {
            let itemtype = ancestor.value().attr("itemtype").unwrap_or("");
            if ancestor.value().attr("itemscope").is_some()
                && (itemtype.ends_with("WebPage") || itemtype.ends_with("WebSite"))
            {
                return Some(ancestor);
            }
        }
        current = node.parent();
    }
    None
}

/// Organization identity (step 9): JSON-LD first, microdata only as fallback.
pub fn resolve_organization(html: &str, homepage_url: &str) -> ScorerResult {
    let jsonld = score_jsonld(html, homepage_url);
    if jsonld.found {
        return jsonld;
    }
    score_microdata(html, homepage_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_matching_homepage_outscores_plain_organization() {
        let html = r#"
            <script type="application/ld+json">
            [
                {"@type": "Organization", "@id": "https://example.com/#organization", "name": "Example Co", "logo": "https://example.com/logo.png"},
                {"@type": "Organization", "name": "Some Other Org"}
            ]
            </script>
        "#;
        let result = score_jsonld(html, "https://example.com");
        assert!(result.found);
        assert_eq!(result.organization.unwrap().name.as_deref(), Some("Example Co"));
        assert!(result.score >= 4);
    }

    #[test]
    fn news_media_organization_scores_higher() {
        let html = r#"
            <script type="application/ld+json">
            {"@type": "NewsMediaOrganization", "name": "Daily News", "url": "https://example.com"}
            </script>
        "#;
        let result = score_jsonld(html, "https://example.com");
        assert!(result.found);
        assert_eq!(result.score, 3 + 3);
    }

    #[test]
    fn zero_score_candidate_without_url_or_id_is_discarded() {
        let html = r#"<script type="application/ld+json">{"@type": "Organization", "description": "no identity"}</script>"#;
        let result = score_jsonld(html, "https://example.com");
        assert!(!result.found);
    }

    #[test]
    fn falls_back_to_microdata_when_jsonld_has_no_candidates() {
        let html = r#"<div itemscope itemtype="https://schema.org/Organization" itemid="https://example.com">
            <span itemprop="name">Example Co</span>
        </div>"#;
        let result = resolve_organization(html, "https://example.com");
        assert_eq!(result.source.as_deref(), Some("microdata"));
    }

    #[test]
    fn expands_graph_nodes() {
        let html = r#"<script type="application/ld+json">
            {"@graph": [{"@type": "Organization", "url": "https://example.com", "name": "Example"}]}
        </script>"#;
        let result = score_jsonld(html, "https://example.com");
        assert!(result.found);
    }

    #[test]
    fn microdata_publisher_nested_in_matching_webpage_scores_two_higher() {
        let html = r#"<div itemscope itemtype="https://schema.org/WebPage">
            <span itemprop="name">Example Co</span>
            <div itemprop="publisher" itemscope itemtype="https://schema.org/Organization">
                <span itemprop="name">Example Co</span>
            </div>
        </div>"#;
        let result = score_microdata(html, "https://elsewhere.example");
        assert!(result.found);
        assert_eq!(result.score, 2);
    }

    #[test]
    fn microdata_publisher_nested_in_mismatched_webpage_scores_nothing() {
        let html = r#"<div itemscope itemtype="https://schema.org/WebPage">
            <span itemprop="name">Some Other Site</span>
            <div itemprop="publisher" itemscope itemtype="https://schema.org/Organization">
                <span itemprop="name">Example Co</span>
            </div>
        </div>"#;
        let result = score_microdata(html, "https://elsewhere.example");
        assert_eq!(result.score, 0);
    }
}
