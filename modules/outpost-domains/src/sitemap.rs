//! Sitemap discovery step.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Well-known sitemap paths probed when robots.txt names none, tried in this order, first success wins.
pub const WELL_KNOWN_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap/sitemap.xml",
    "/wp-sitemap.xml",
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapResult {
    pub sitemap_urls: Vec<String>,
    pub source: SitemapSource,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SitemapSource {
    Robots,
    Probe,
    None,
}

/// A fetched body counts as a sitemap only if it looks like XML, not an HTML 404 or WAF challenge page.
pub fn looks_like_sitemap_xml(body: &str) -> bool {
    let trimmed = body.trim_start();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("<html") || lower.starts_with("<!doctype") {
        return false;
    }
    trimmed.starts_with("<?xml") || lower.contains("<urlset") || lower.contains("<sitemapindex")
}

/// Builds the step result once robots.txt sitemaps or a probe attempt have
/// been resolved by the caller (which owns the actual HTTP fetching via the
/// Fetch Manager).
pub fn resolve(robots_sitemaps: &[String], probe_hit: Option<String>) -> SitemapResult {
    if !robots_sitemaps.is_empty() {
        let mut sitemap_urls = robots_sitemaps.to_vec();
        sitemap_urls.sort();
        return SitemapResult {
            count: sitemap_urls.len(),
            sitemap_urls,
            source: SitemapSource::Robots,
        };
    }
    match probe_hit {
        Some(url) => SitemapResult {
            sitemap_urls: vec![url],
            source: SitemapSource::Probe,
            count: 1,
        },
        None => SitemapResult {
            sitemap_urls: Vec::new(),
            source: SitemapSource::None,
            count: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robots_sourced_sitemaps_take_priority_over_probing() {
        let result = resolve(
            &["https://example.com/sitemap.xml".to_string()],
            Some("https://example.com/sitemap_index.xml".to_string()),
        );
        assert_eq!(result.source, SitemapSource::Robots);
        assert_eq!(result.sitemap_urls, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn falls_back_to_probe_hit_when_robots_silent() {
        let result = resolve(&[], Some("https://example.com/sitemap.xml".to_string()));
        assert_eq!(result.source, SitemapSource::Probe);
    }

    #[test]
    fn no_source_when_both_empty() {
        let result = resolve(&[], None);
        assert_eq!(result.source, SitemapSource::None);
        assert!(result.sitemap_urls.is_empty());
    }

    #[test]
    fn sniffs_xml_sitemap_bodies() {
        assert!(looks_like_sitemap_xml(
            "<?xml version=\"1.0\"?><urlset><url><loc>x</loc></url></urlset>"
        ));
        assert!(looks_like_sitemap_xml("<sitemapindex><sitemap/></sitemapindex>"));
        assert!(!looks_like_sitemap_xml("<!doctype html><html>not found</html>"));
    }
}
