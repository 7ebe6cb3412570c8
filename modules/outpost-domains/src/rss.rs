//! RSS/Atom feed discovery step.

use scraper::{Html, Selector};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// MIME types that mark a `<link rel="alternate">` as a feed.
pub const FEED_MIME_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/xml",
    "text/xml",
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedLink {
    pub url: String,
    pub r#type: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RssResult {
    pub feeds: Vec<FeedLink>,
    pub count: usize,
}

fn alternate_link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse(r#"link[rel="alternate"]"#).unwrap())
}

/// Extract feed links from `<link rel="alternate" type="...">` elements in
/// an HTML document's `<head>`.
pub fn extract_feeds(html: &str, base_url: &url::Url) -> RssResult {
    let document = Html::parse_document(html);
    let mut feeds = Vec::new();

    for element in document.select(alternate_link_selector()) {
        let Some(mime) = element.value().attr("type") else {
            continue;
        };
        if !FEED_MIME_TYPES.iter().any(|t| t.eq_ignore_ascii_case(mime)) {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        feeds.push(FeedLink {
            url: resolved.to_string(),
            r#type: mime.to_string(),
            title: element.value().attr("title").map(String::from),
        });
    }

    RssResult {
        count: feeds.len(),
        feeds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rss_and_atom_links_only() {
        let html = r#"
            <html><head>
                <link rel="alternate" type="application/rss+xml" href="/feed.xml" title="Main Feed">
                <link rel="alternate" type="application/atom+xml" href="/atom.xml">
                <link rel="alternate" type="text/css" href="/ignored.css">
                <link rel="stylesheet" type="application/rss+xml" href="/not-alternate.xml">
            </head></html>
        "#;
        let base = url::Url::parse("https://example.com/").unwrap();
        let result = extract_feeds(html, &base);
        assert_eq!(result.count, 2);
        assert_eq!(result.feeds[0].url, "https://example.com/feed.xml");
        assert_eq!(result.feeds[0].title.as_deref(), Some("Main Feed"));
        assert_eq!(result.feeds[1].url, "https://example.com/atom.xml");
    }

    #[test]
    fn no_feed_links_yields_empty_result() {
        let html = "<html><head></head><body></body></html>";
        let base = url::Url::parse("https://example.com/").unwrap();
        let result = extract_feeds(html, &base);
        assert_eq!(result.count, 0);
        assert!(result.feeds.is_empty());
    }
}
