//! RSL (Really Simple Licensing) detection step.
//!
//! Three independent indicator sources; any one of them is sufficient.

use scraper::{Html, Selector};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RslResult {
    pub rsl_detected: bool,
    pub indicators: Vec<String>,
    pub count: usize,
    pub sources: Vec<RslSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RslSource {
    RobotsLicense,
    HtmlLinkRel,
    HttpLinkHeader,
}

fn rsl_link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse(r#"link[rel="license"]"#).unwrap())
}

/// `<link rel="license" type="application/rsl+xml">` in the document head.
pub fn html_license_links(html: &str, base_url: &url::Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(rsl_link_selector())
        .filter(|el| {
            el.value()
                .attr("type")
                .map(|t| t.eq_ignore_ascii_case("application/rsl+xml"))
                .unwrap_or(false)
        })
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

/// `Link: <url>; rel="license"; type="application/rsl+xml"` HTTP response
/// headers (RFC 8288); both markers must be present.
pub fn http_link_header_licenses(headers: &[(String, String)]) -> Vec<String> {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("link"))
        .flat_map(|(_, value)| value.split(','))
        .filter(|part| {
            let lower = part.to_lowercase();
            lower.contains(r#"rel="license""#) && lower.contains("application/rsl+xml")
        })
        .filter_map(|part| {
            let start = part.find('<')?;
            let end = part.find('>')?;
            if end > start {
                Some(part[start + 1..end].trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Merge the three indicator sources. Detected if any
/// source contributed at least one license URL.
pub fn resolve(
    robots_licenses: &[String],
    html_licenses: Vec<String>,
    header_licenses: Vec<String>,
) -> RslResult {
    let mut indicators = Vec::new();
    let mut sources = Vec::new();

    if !robots_licenses.is_empty() {
        indicators.extend(robots_licenses.iter().cloned());
        sources.push(RslSource::RobotsLicense);
    }
    if !html_licenses.is_empty() {
        indicators.extend(html_licenses);
        sources.push(RslSource::HtmlLinkRel);
    }
    if !header_licenses.is_empty() {
        indicators.extend(header_licenses);
        sources.push(RslSource::HttpLinkHeader);
    }

    indicators.dedup();
    RslResult {
        rsl_detected: !indicators.is_empty(),
        count: indicators.len(),
        indicators,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_html_link_rel_license() {
        let html = r#"<html><head><link rel="license" type="application/rsl+xml" href="/rsl.xml"></head></html>"#;
        let base = url::Url::parse("https://example.com/").unwrap();
        let urls = html_license_links(html, &base);
        assert_eq!(urls, vec!["https://example.com/rsl.xml"]);
    }

    #[test]
    fn ignores_non_rsl_license_links() {
        let html = r#"<html><head><link rel="license" href="/cc-by.html"></head></html>"#;
        let base = url::Url::parse("https://example.com/").unwrap();
        assert!(html_license_links(html, &base).is_empty());
    }

    #[test]
    fn parses_link_header_license() {
        let headers = vec![(
            "Link".to_string(),
            r#"<https://example.com/rsl.xml>; rel="license"; type="application/rsl+xml""#.to_string(),
        )];
        assert_eq!(
            http_link_header_licenses(&headers),
            vec!["https://example.com/rsl.xml"]
        );
    }

    #[test]
    fn link_header_without_rsl_type_is_ignored() {
        let headers = vec![(
            "Link".to_string(),
            r#"<https://example.com/cc-by.html>; rel="license""#.to_string(),
        )];
        assert!(http_link_header_licenses(&headers).is_empty());
    }

    #[test]
    fn no_indicators_means_not_detected() {
        let result = resolve(&[], vec![], vec![]);
        assert!(!result.rsl_detected);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn any_single_source_is_sufficient() {
        let result = resolve(&["https://example.com/rsl.xml".to_string()], vec![], vec![]);
        assert!(result.rsl_detected);
        assert_eq!(result.sources, vec![RslSource::RobotsLicense]);
    }
}
