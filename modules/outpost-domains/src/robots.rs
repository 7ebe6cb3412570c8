//! Robots step and AI bot blocking step.
//!
//! Hand-rolled rather than built on an off-the-shelf robots.txt crate: the
//! non-standard `License:` directive (feeding RSL detection) has no standard
//! support, so the group/rule parser below is written once and shared by the
//! allow/deny evaluator and the license-line scan.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The thirteen AI crawler user agents evaluated by the AI-bot step (spec
/// §4.4 step 5), each mapped to the company operating it.
pub const AI_BOT_AGENTS: &[(&str, &str)] = &[
    ("GPTBot", "OpenAI"),
    ("ChatGPT-User", "OpenAI"),
    ("Google-Extended", "Google"),
    ("anthropic-ai", "Anthropic"),
    ("ClaudeBot", "Anthropic"),
    ("CCBot", "Common Crawl"),
    ("Bytespider", "ByteDance"),
    ("Amazonbot", "Amazon"),
    ("FacebookBot", "Meta"),
    ("Meta-ExternalAgent", "Meta"),
    ("cohere-ai", "Cohere"),
    ("PerplexityBot", "Perplexity"),
    ("Applebot-Extended", "Apple"),
];

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    path: String,
}

#[derive(Debug, Clone, Default)]
struct Group {
    user_agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
    pub sitemaps: Vec<String>,
    pub licenses: Vec<String>,
    pub raw_text: String,
}

fn license_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*license\s*:\s*(\S+)\s*$").unwrap())
}

impl RobotsTxt {
    /// Parse a robots.txt body per RFC 9309, plus the non-standard
    /// `License:` directive used for RSL discovery.
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut current: Option<Group> = None;
        let mut awaiting_agents = true;

        for raw_line in body.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if awaiting_agents {
                        let group = current.get_or_insert_with(Group::default);
                        group.user_agents.push(value.to_lowercase());
                    } else {
                        if let Some(g) = current.take() {
                            groups.push(g);
                        }
                        let mut group = Group::default();
                        group.user_agents.push(value.to_lowercase());
                        current = Some(group);
                        awaiting_agents = true;
                    }
                }
                "disallow" => {
                    awaiting_agents = false;
                    if let Some(g) = current.as_mut() {
                        if !value.is_empty() {
                            g.rules.push(Rule {
                                allow: false,
                                path: value.to_string(),
                            });
                        }
                    }
                }
                "allow" => {
                    awaiting_agents = false;
                    if let Some(g) = current.as_mut() {
                        g.rules.push(Rule {
                            allow: true,
                            path: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    awaiting_agents = false;
                    if let Some(g) = current.as_mut() {
                        g.crawl_delay = value.parse().ok();
                    }
                }
                "sitemap" => {
                    sitemaps.push(value.to_string());
                }
                _ => {}
            }
        }
        if let Some(g) = current.take() {
            groups.push(g);
        }

        let licenses = license_regex()
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect();

        Self {
            groups,
            sitemaps,
            licenses,
            raw_text: body.to_string(),
        }
    }

    /// RFC 9309 group selection: the most specific matching product token,
    /// falling back to the wildcard group. No matching group means allowed.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_lowercase();
        let specific = self
            .groups
            .iter()
            .filter(|g| g.user_agents.iter().any(|a| a != "*" && ua.starts_with(a)))
            .max_by_key(|g| {
                g.user_agents
                    .iter()
                    .filter(|a| a.as_str() != "*" && ua.starts_with(a.as_str()))
                    .map(|a| a.len())
                    .max()
                    .unwrap_or(0)
            });
        specific.or_else(|| self.groups.iter().find(|g| g.user_agents.iter().any(|a| a == "*")))
    }

    /// Whether `user_agent` may fetch `path`. RFC 9309: longest matching rule wins; ties
    /// prefer Allow.
    pub fn can_fetch(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut best: Option<&Rule> = None;
        for rule in &group.rules {
            if path_matches(&rule.path, path) {
                let better = match best {
                    None => true,
                    Some(b) => {
                        rule.path.len() > b.path.len()
                            || (rule.path.len() == b.path.len() && rule.allow && !b.allow)
                    }
                };
                if better {
                    best = Some(rule);
                }
            }
        }

        best.map(|r| r.allow).unwrap_or(true)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Robots.txt path matching: a rule path is a prefix match, with `*` as a
/// wildcard and `$` anchoring the end (RFC 9309 §2.2.3).
fn path_matches(rule_path: &str, path: &str) -> bool {
    if rule_path.is_empty() {
        return true;
    }
    if !rule_path.contains('*') && !rule_path.ends_with('$') {
        return path.starts_with(rule_path);
    }

    let anchored_end = rule_path.ends_with('$');
    let pattern = rule_path.trim_end_matches('$');
    let segments: Vec<&str> = pattern.split('*').collect();

    let mut rest = path;
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        match rest.find(seg) {
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + seg.len()..];
            }
            None => return false,
        }
    }
    if anchored_end {
        rest.is_empty()
    } else {
        true
    }
}

// ---------------------------------------------------------------------
// Step result types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RobotsResult {
    pub robots_found: bool,
    pub url_allowed: Option<bool>,
    pub sitemaps: Vec<String>,
    pub crawl_delay: Option<f64>,
    pub licenses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A robots.txt fetch that returned an HTML WAF challenge page instead of
/// the real document is not a parse failure, it's a block.
pub fn looks_like_html_challenge(body: &str) -> bool {
    let trimmed = body.trim_start().to_lowercase();
    trimmed.starts_with("<html") || trimmed.starts_with("<!doctype")
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AiBotEntry {
    pub company: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AiBotResult {
    pub bots: std::collections::BTreeMap<String, AiBotEntry>,
    pub blocked_count: usize,
    pub total_count: usize,
}

/// AI bot blocking step: evaluate `can_fetch("/")` for
/// each of the thirteen named agents against the parsed robots.txt.
pub fn evaluate_ai_bots(robots: &RobotsTxt) -> AiBotResult {
    let mut bots = std::collections::BTreeMap::new();
    let mut blocked_count = 0;

    for (agent, company) in AI_BOT_AGENTS {
        let allowed = robots.can_fetch(agent, "/");
        if !allowed {
            blocked_count += 1;
        }
        bots.insert(
            agent.to_string(),
            AiBotEntry {
                company: company.to_string(),
                blocked: !allowed,
            },
        );
    }

    AiBotResult {
        bots,
        blocked_count,
        total_count: AI_BOT_AGENTS.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_allowed_respects_disallow_prefix() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /private/");
        assert!(!robots.can_fetch("itsascout", "/private/x"));
        assert!(robots.can_fetch("itsascout", "/public/y"));
    }

    #[test]
    fn ai_bot_matrix_matches_spec_example() {
        let robots =
            RobotsTxt::parse("User-agent: GPTBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        let result = evaluate_ai_bots(&robots);
        assert!(result.bots["GPTBot"].blocked);
        assert!(!result.bots["ClaudeBot"].blocked);
        assert_eq!(result.blocked_count, 1);
        assert_eq!(result.total_count, 13);
    }

    #[test]
    fn collects_sitemap_and_license_directives() {
        let robots = RobotsTxt::parse(
            "User-agent: *\nDisallow: /admin/\nSitemap: https://example.com/sitemap.xml\nLicense: https://example.com/rsl.xml\n",
        );
        assert_eq!(robots.sitemaps, vec!["https://example.com/sitemap.xml"]);
        assert_eq!(robots.licenses, vec!["https://example.com/rsl.xml"]);
    }

    #[test]
    fn license_directive_is_case_insensitive() {
        let robots = RobotsTxt::parse("license: https://example.com/rsl.xml\n");
        assert_eq!(robots.licenses, vec!["https://example.com/rsl.xml"]);
    }

    #[test]
    fn detects_html_challenge_body() {
        assert!(looks_like_html_challenge("<!doctype html><html>blocked</html>"));
        assert!(looks_like_html_challenge("  <HTML><body>blocked</body></html>"));
        assert!(!looks_like_html_challenge("User-agent: *\nDisallow: /"));
    }

    #[test]
    fn crawl_delay_parsed_for_named_agent() {
        let robots = RobotsTxt::parse("User-agent: itsascout\nCrawl-delay: 2\n");
        assert_eq!(robots.crawl_delay("itsascout"), Some(2.0));
    }

    #[test]
    fn no_matching_group_means_allowed() {
        let robots = RobotsTxt::parse("User-agent: SomeOtherBot\nDisallow: /\n");
        assert!(robots.can_fetch("itsascout", "/anything"));
    }
}
