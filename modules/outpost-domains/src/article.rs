//! Article extraction step.

use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// `@type` values (bare, not the `https://schema.org/` prefixed form) that
/// mark a JSON-LD node as an article.
const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "BlogPosting",
    "TechArticle",
    "ScholarlyArticle",
    "OpinionNewsArticle",
    "AnalysisNewsArticle",
    "ReportageNewsArticle",
    "ReviewNewsArticle",
    "LiveBlogPosting",
    "SocialMediaPosting",
    "WebPage",
    "CreativeWork",
];

/// `og:property` -> output field name.
const OG_PROPERTY_MAP: &[(&str, &str)] = &[
    ("og:title", "headline"),
    ("og:description", "description"),
    ("og:image", "image"),
    ("og:type", "type"),
    ("og:site_name", "publisher_name"),
    ("og:locale", "inLanguage"),
    ("article:published_time", "datePublished"),
    ("article:modified_time", "dateModified"),
    ("article:author", "author"),
    ("article:section", "articleSection"),
];

const OG_KEYWORDS_PROPERTY: &str = "article:tag";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArticleExtractionResult {
    pub jsonld_fields: Option<Value>,
    pub opengraph_fields: Option<Value>,
    pub microdata_fields: Option<Value>,
    pub twitter_cards: Option<Value>,
    pub has_jsonld: bool,
    pub has_opengraph: bool,
    pub has_microdata: bool,
    pub has_twitter_cards: bool,
    pub formats_found: Vec<String>,
}

fn jsonld_script_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap())
}

fn meta_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("meta").unwrap())
}

fn type_strings(node: &Value) -> Vec<String> {
    match node.get("@type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    }
}

fn is_article_node(node: &Value) -> bool {
    type_strings(node).iter().any(|t| {
        let bare = t.rsplit('/').next().unwrap_or(t);
        ARTICLE_TYPES.contains(&bare)
    })
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

/// Flatten a nested `publisher`/`author` dict to its `name` or `@id`, leaving
/// scalar values untouched.
fn flatten_entity_field(value: &Value) -> Value {
    match value {
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("@id"))
            .cloned()
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(flatten_entity_field).collect()),
        other => other.clone(),
    }
}

fn find_first_article_node(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let mut nodes = Vec::new();
    for script in document.select(jsonld_script_selector()) {
        let text: String = script.text().collect();
        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        collect_nodes(&parsed, &mut nodes);
    }
    nodes.into_iter().find(is_article_node)
}

fn extract_jsonld(html: &str) -> Option<Value> {
    let node = find_first_article_node(html)?;
    let Value::Object(mut map) = node else {
        return None;
    };
    for key in ["publisher", "author"] {
        if let Some(v) = map.get(key).cloned() {
            map.insert(key.to_string(), flatten_entity_field(&v));
        }
    }
    Some(Value::Object(map))
}

fn extract_opengraph(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let mut fields: Map<String, Value> = Map::new();
    let mut keywords: Vec<String> = Vec::new();

    for meta in document.select(meta_selector()) {
        let Some(property) = meta.value().attr("property") else {
            continue;
        };
        let Some(content) = meta.value().attr("content") else {
            continue;
        };

        if property.eq_ignore_ascii_case(OG_KEYWORDS_PROPERTY) {
            keywords.push(content.to_string());
            continue;
        }

        if let Some((_, field)) = OG_PROPERTY_MAP.iter().find(|(p, _)| p.eq_ignore_ascii_case(property)) {
            fields.insert(field.to_string(), Value::String(content.to_string()));
        }
    }

    if !keywords.is_empty() {
        fields.insert(
            "keywords".to_string(),
            Value::Array(keywords.into_iter().map(Value::String).collect()),
        );
    }

    if fields.is_empty() {
        None
    } else {
        Some(Value::Object(fields))
    }
}

fn twitter_card_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse(r#"meta[name^="twitter:"]"#).unwrap())
}

fn extract_twitter_cards(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let mut fields: Map<String, Value> = Map::new();
    for meta in document.select(twitter_card_selector()) {
        let (Some(name), Some(content)) = (meta.value().attr("name"), meta.value().attr("content")) else {
            continue;
        };
        fields.insert(name.to_string(), Value::String(content.to_string()));
    }
    if fields.is_empty() {
        None
    } else {
        Some(Value::Object(fields))
    }
}

fn microdata_article_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("[itemscope][itemtype*=\"Article\"]").unwrap())
}

fn extract_microdata(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let article = document.select(microdata_article_selector()).next()?;

    let props = ["headline", "datePublished", "dateModified", "author", "image", "description"];
    let mut fields: Map<String, Value> = Map::new();
    for prop in props {
        let Ok(selector) = Selector::parse(&format!("[itemprop=\"{prop}\"]")) else {
            continue;
        };
        if let Some(el) = article.select(&selector).next() {
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("href"))
                .or_else(|| el.value().attr("src"))
                .map(String::from)
                .unwrap_or_else(|| el.text().collect::<String>());
            fields.insert(prop.to_string(), Value::String(value));
        }
    }

    if fields.is_empty() {
        None
    } else {
        Some(Value::Object(fields))
    }
}

/// Run the full article extraction step.
pub fn extract(html: &str) -> ArticleExtractionResult {
    let jsonld_fields = extract_jsonld(html);
    let opengraph_fields = extract_opengraph(html);
    let microdata_fields = extract_microdata(html);
    let twitter_cards = extract_twitter_cards(html);

    let has_jsonld = outpost_common::field_map_present(&jsonld_fields);
    let has_opengraph = outpost_common::field_map_present(&opengraph_fields);
    let has_microdata = outpost_common::field_map_present(&microdata_fields);
    let has_twitter_cards = outpost_common::field_map_present(&twitter_cards);

    let mut formats_found = Vec::new();
    if has_jsonld {
        formats_found.push("json-ld".to_string());
    }
    if has_opengraph {
        formats_found.push("opengraph".to_string());
    }
    if has_microdata {
        formats_found.push("microdata".to_string());
    }
    if has_twitter_cards {
        formats_found.push("twitter_cards".to_string());
    }

    ArticleExtractionResult {
        jsonld_fields,
        opengraph_fields,
        microdata_fields,
        twitter_cards,
        has_jsonld,
        has_opengraph,
        has_microdata,
        has_twitter_cards,
        formats_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_matching_jsonld_type() {
        let html = r#"<script type="application/ld+json">
            {"@type": "NewsArticle", "headline": "Title", "publisher": {"@type": "Organization", "name": "Example Co"}}
        </script>"#;
        let result = extract(html);
        assert!(result.has_jsonld);
        let fields = result.jsonld_fields.unwrap();
        assert_eq!(fields["headline"], "Title");
        assert_eq!(fields["publisher"], "Example Co");
    }

    #[test]
    fn maps_opengraph_properties_and_accumulates_tags() {
        let html = r#"<html><head>
            <meta property="og:title" content="Headline">
            <meta property="article:tag" content="politics">
            <meta property="article:tag" content="economy">
        </head></html>"#;
        let result = extract(html);
        let fields = result.opengraph_fields.unwrap();
        assert_eq!(fields["headline"], "Headline");
        assert_eq!(fields["keywords"], serde_json::json!(["politics", "economy"]));
    }

    #[test]
    fn collects_twitter_card_meta_tags() {
        let html = r#"<meta name="twitter:card" content="summary"><meta name="twitter:title" content="T">"#;
        let result = extract(html);
        let cards = result.twitter_cards.unwrap();
        assert_eq!(cards["twitter:card"], "summary");
    }

    #[test]
    fn absent_formats_yield_none_and_empty_formats_found() {
        let result = extract("<html><body>plain</body></html>");
        assert!(!result.has_jsonld);
        assert!(!result.has_opengraph);
        assert!(result.formats_found.is_empty());
    }
}
