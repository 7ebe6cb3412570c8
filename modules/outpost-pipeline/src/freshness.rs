//! Freshness/Dedup Layer: decide whether publisher-level or
//! article-level steps may be skipped and their results copied instead of
//! recomputed.

use chrono::{DateTime, Utc};
use outpost_common::Publisher;
use std::time::Duration;

/// True iff `publisher.last_checked_at` is set and younger than `ttl`.
pub fn should_skip_publisher_steps(publisher: &Publisher, ttl: Duration, now: DateTime<Utc>) -> bool {
    match publisher.last_checked_at {
        Some(last_checked_at) => {
            let age = now.signed_duration_since(last_checked_at);
            age < chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
        }
        None => false,
    }
}

/// True iff an `ArticleMetadata` row exists for `article_created_at` younger
/// than `ttl` (the caller looks the row up by article URL and passes its
/// `created_at` here).
pub fn should_skip_article_steps(article_created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(article_created_at);
    age < chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_common::Publisher;

    #[test]
    fn skips_when_checked_within_ttl() {
        let now = Utc::now();
        let mut publisher = Publisher::new("example.com".to_string(), "https://example.com".to_string());
        publisher.last_checked_at = Some(now - chrono::Duration::hours(1));
        assert!(should_skip_publisher_steps(&publisher, Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn does_not_skip_when_stale() {
        let now = Utc::now();
        let mut publisher = Publisher::new("example.com".to_string(), "https://example.com".to_string());
        publisher.last_checked_at = Some(now - chrono::Duration::hours(48));
        assert!(!should_skip_publisher_steps(&publisher, Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn does_not_skip_when_never_checked() {
        let now = Utc::now();
        let publisher = Publisher::new("example.com".to_string(), "https://example.com".to_string());
        assert!(!should_skip_publisher_steps(&publisher, Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn article_steps_skip_within_ttl() {
        let now = Utc::now();
        let created_at = now - chrono::Duration::hours(2);
        assert!(should_skip_article_steps(created_at, Duration::from_secs(24 * 3600), now));
    }
}
